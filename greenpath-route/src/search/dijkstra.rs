//! Label-setting shortest-path core.
//!
//! Min-heap over (cost, accumulated length, node id): ties on cost are
//! broken by shorter length, then lower node id, so equal-cost queries
//! are deterministic across runs. The penalty overlay multiplies the
//! cost of selected edges without touching the graph, which is what the
//! K-alternative loop uses to push successive runs off already-found
//! corridors.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use greenpath_common::{Result, RouteError};

use crate::cost::{CostModel, RoutingProfile};
use crate::graph::{EdgeId, ExposureGraph, NodeId};

/// One settled origin-to-destination path.
#[derive(Debug, Clone)]
pub(crate) struct PathFound {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    /// Total cost as searched, including any penalty overlay.
    pub penalized_cost: f64,
}

struct QueueEntry {
    cost: f64,
    length_m: f64,
    node: NodeId,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.length_m == other.length_m && self.node == other.node
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed on every key so the std max-heap pops the smallest
        // (cost, length, node) triple first.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                other
                    .length_m
                    .partial_cmp(&self.length_m)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Dijkstra from `origin`, terminating when `destination` is settled.
/// Returns `Ok(None)` when the queue drains first (unreachable).
/// Cancellation is checked at every expansion and aborts promptly; no
/// engine-global state exists to clean up.
pub(crate) fn shortest_path(
    graph: &ExposureGraph,
    cost_model: &CostModel,
    profile: &RoutingProfile,
    penalties: &FxHashMap<EdgeId, f64>,
    origin: NodeId,
    destination: NodeId,
    cancel: &CancellationToken,
) -> Result<Option<PathFound>> {
    let n = graph.node_count();
    let mut dist = vec![f64::INFINITY; n];
    let mut length = vec![0.0f64; n];
    let mut parent_node = vec![NodeId::MAX; n];
    let mut parent_edge = vec![EdgeId::MAX; n];
    let mut heap = BinaryHeap::new();

    dist[origin as usize] = 0.0;
    heap.push(QueueEntry {
        cost: 0.0,
        length_m: 0.0,
        node: origin,
    });

    while let Some(entry) = heap.pop() {
        if cancel.is_cancelled() {
            return Err(RouteError::Cancelled);
        }
        let u = entry.node as usize;
        if entry.cost > dist[u] {
            continue; // stale entry
        }
        if entry.node == destination {
            return Ok(Some(reconstruct(
                origin,
                destination,
                entry.cost,
                &parent_node,
                &parent_edge,
            )));
        }

        for &edge_id in graph.out_edges(entry.node) {
            let edge = graph.edge(edge_id);
            if !profile.mode.allows(edge.mode) {
                continue;
            }
            let mut edge_cost = cost_model.edge_cost(edge, graph.edge_aqi(edge_id), profile);
            if let Some(&penalty) = penalties.get(&edge_id) {
                edge_cost *= penalty;
            }
            let new_cost = dist[u] + edge_cost;
            let new_length = length[u] + edge.length_m;
            let v = edge.to as usize;
            if improves(
                new_cost,
                new_length,
                entry.node,
                dist[v],
                length[v],
                parent_node[v],
            ) {
                dist[v] = new_cost;
                length[v] = new_length;
                parent_node[v] = entry.node;
                parent_edge[v] = edge_id;
                heap.push(QueueEntry {
                    cost: new_cost,
                    length_m: new_length,
                    node: edge.to,
                });
            }
        }
    }

    Ok(None)
}

/// Label comparison: lexicographic on (cost, length, parent node id).
fn improves(
    new_cost: f64,
    new_length: f64,
    from: NodeId,
    cur_cost: f64,
    cur_length: f64,
    cur_parent: NodeId,
) -> bool {
    if new_cost < cur_cost {
        return true;
    }
    if new_cost > cur_cost {
        return false;
    }
    if new_length < cur_length {
        return true;
    }
    if new_length > cur_length {
        return false;
    }
    from < cur_parent
}

fn reconstruct(
    origin: NodeId,
    destination: NodeId,
    cost: f64,
    parent_node: &[NodeId],
    parent_edge: &[EdgeId],
) -> PathFound {
    let mut nodes = vec![destination];
    let mut edges = Vec::new();
    let mut current = destination;
    while current != origin {
        edges.push(parent_edge[current as usize]);
        current = parent_node[current as usize];
        nodes.push(current);
    }
    nodes.reverse();
    edges.reverse();
    PathFound {
        nodes,
        edges,
        penalized_cost: cost,
    }
}
