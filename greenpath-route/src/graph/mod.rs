//! In-memory exposure graph: immutable street topology with static
//! environmental attributes and one mutable per-edge AQI cost field.
//!
//! Topology and static attributes never change after load, so concurrent
//! searches read them without synchronization. The AQI field is stored as
//! the bit pattern of an `f32` in an `AtomicU32`: a refresh replaces each
//! value with a single atomic store, so a concurrent reader sees either
//! the old or the new value for that edge, never a torn one. There is no
//! graph-wide snapshot isolation — a search that overlaps a refresh may
//! observe a mix of pre- and post-refresh values across different edges.

pub mod loader;
pub mod spatial;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use greenpath_common::{Result, RouteError};

use crate::geo::haversine_distance;
use self::spatial::SpatialIndex;

/// Dense node index, assigned in load order.
pub type NodeId = u32;
/// Dense edge index, assigned in load order.
pub type EdgeId = u32;

/// Neutral AQI assigned to every edge until the first refresh lands.
/// 1.0 is the cleanest class of the 1-5 air-quality index, i.e. missing
/// AQI data adds no cost.
pub const NEUTRAL_AQI: f32 = 1.0;

/// Default maximum distance between a requested coordinate and the
/// nearest graph node for the request to be considered snappable.
pub const DEFAULT_MAX_SNAP_DISTANCE_M: f64 = 300.0;

/// Travel mode of a routing profile, and the mode tag of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TravelMode {
    Walk,
    Bike,
    Transit,
}

impl TravelMode {
    pub fn parse(s: &str) -> Option<TravelMode> {
        match s.to_lowercase().as_str() {
            "walk" => Some(TravelMode::Walk),
            "bike" => Some(TravelMode::Bike),
            "transit" => Some(TravelMode::Transit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TravelMode::Walk => "walk",
            TravelMode::Bike => "bike",
            TravelMode::Transit => "transit",
        }
    }

    /// Whether an edge tagged `edge_mode` is traversable under this
    /// routing mode. Walking uses only walk edges; cycling additionally
    /// uses walk edges (dismounting); transit profiles use everything,
    /// with transit travel times precomputed into edge weights.
    pub fn allows(self, edge_mode: TravelMode) -> bool {
        match self {
            TravelMode::Walk => edge_mode == TravelMode::Walk,
            TravelMode::Bike => matches!(edge_mode, TravelMode::Walk | TravelMode::Bike),
            TravelMode::Transit => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    /// Stable id from the graph-construction pipeline.
    pub external_id: u64,
    pub lat: f64,
    pub lon: f64,
}

/// Directed edge with static environmental attributes. The mutable AQI
/// field lives in a parallel array on the graph, not here.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Stable id from the graph-construction pipeline; AQI snapshots are
    /// keyed by this.
    pub external_id: u64,
    pub from: NodeId,
    pub to: NodeId,
    pub length_m: f64,
    pub mode: TravelMode,
    /// Representative noise exposure level over the edge, in dB.
    pub noise_db: f32,
    /// Fraction of the edge length adjacent to vegetation, in [0, 1].
    pub greenery_ratio: f32,
}

/// Result of committing one AQI snapshot to the graph.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOutcome {
    /// Number of edges whose AQI value was replaced.
    pub applied: usize,
    /// External edge ids named in the snapshot that do not exist in the
    /// graph; logged and skipped rather than aborting the batch.
    pub unknown: Vec<u64>,
}

#[derive(Debug)]
pub struct ExposureGraph {
    version: String,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    // CSR adjacency over outgoing edges, in edge insertion order for
    // deterministic neighbor iteration.
    out_offsets: Vec<u32>,
    out_edges: Vec<EdgeId>,
    node_ids: FxHashMap<u64, NodeId>,
    edge_ids: FxHashMap<u64, EdgeId>,
    // f32 bit patterns, one slot per edge.
    aqi: Vec<AtomicU32>,
    spatial: SpatialIndex,
    max_snap_distance_m: f64,
}

impl ExposureGraph {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        version: String,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        out_offsets: Vec<u32>,
        out_edges: Vec<EdgeId>,
        node_ids: FxHashMap<u64, NodeId>,
        edge_ids: FxHashMap<u64, EdgeId>,
        max_snap_distance_m: f64,
    ) -> Self {
        let aqi = (0..edges.len())
            .map(|_| AtomicU32::new(NEUTRAL_AQI.to_bits()))
            .collect();
        let spatial = SpatialIndex::build(&nodes);
        Self {
            version,
            nodes,
            edges,
            out_offsets,
            out_edges,
            node_ids,
            edge_ids,
            aqi,
            spatial,
            max_snap_distance_m,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize)
    }

    /// Panics if `id` is out of range; dense ids only ever come from this
    /// graph instance.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id as usize]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id as usize]
    }

    pub fn node_by_external_id(&self, external_id: u64) -> Option<NodeId> {
        self.node_ids.get(&external_id).copied()
    }

    pub fn edge_by_external_id(&self, external_id: u64) -> Option<EdgeId> {
        self.edge_ids.get(&external_id).copied()
    }

    /// Outgoing edges of a node, in insertion order.
    pub fn out_edges(&self, node: NodeId) -> &[EdgeId] {
        let start = self.out_offsets[node as usize] as usize;
        let end = self.out_offsets[node as usize + 1] as usize;
        &self.out_edges[start..end]
    }

    /// Current AQI value of an edge. Relaxed load: the only contract is
    /// that the value is never torn.
    pub fn edge_aqi(&self, id: EdgeId) -> f32 {
        f32::from_bits(self.aqi[id as usize].load(Ordering::Relaxed))
    }

    pub fn max_snap_distance_m(&self) -> f64 {
        self.max_snap_distance_m
    }

    /// Snap a coordinate to the nearest graph node, or fail with
    /// `InvalidCoordinate` if nothing lies within the maximum snap
    /// distance.
    pub fn nearest_node(&self, lat: f64, lon: f64) -> Result<NodeId> {
        let candidate = self.spatial.nearest(lon, lat);
        if let Some(id) = candidate {
            let node = self.node(id);
            let distance = haversine_distance(lat, lon, node.lat, node.lon);
            if distance <= self.max_snap_distance_m {
                return Ok(id);
            }
        }
        Err(RouteError::InvalidCoordinate {
            lat,
            lon,
            max_distance_m: self.max_snap_distance_m,
        })
    }

    /// Replace the AQI value of every edge named in `values` with a
    /// single atomic store per edge. Edges not named keep their previous
    /// value. Unknown edge ids are logged and skipped so that a partial
    /// snapshot remains usable.
    pub fn apply_aqi_snapshot(&self, values: &FxHashMap<u64, f32>) -> SnapshotOutcome {
        let mut outcome = SnapshotOutcome::default();
        for (&external_id, &value) in values {
            match self.edge_ids.get(&external_id) {
                Some(&edge) => {
                    self.aqi[edge as usize].store(value.to_bits(), Ordering::Relaxed);
                    outcome.applied += 1;
                }
                None => {
                    tracing::warn!(
                        error = %RouteError::UnknownEdge(external_id),
                        "skipping AQI snapshot entry"
                    );
                    outcome.unknown.push(external_id);
                }
            }
        }
        outcome.unknown.sort_unstable();
        outcome
    }
}

/// Shared handle to the current graph instance.
///
/// Reload is a whole-instance swap: readers clone the inner `Arc` once at
/// the start of a request and keep using that instance to completion even
/// if a reload lands mid-request. Nothing outside the refresh coordinator
/// can mutate a graph through this handle.
#[derive(Clone)]
pub struct GraphHandle {
    inner: Arc<RwLock<Arc<ExposureGraph>>>,
}

impl GraphHandle {
    pub fn new(graph: ExposureGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(graph))),
        }
    }

    /// The graph instance to use for one request.
    pub fn current(&self) -> Arc<ExposureGraph> {
        self.inner.read().clone()
    }

    /// Atomically cut over to a freshly loaded graph. In-flight queries
    /// finish on the instance they already hold.
    pub fn replace(&self, graph: ExposureGraph) {
        let mut slot = self.inner.write();
        tracing::info!(
            old_version = %slot.version(),
            new_version = %graph.version(),
            "swapping exposure graph"
        );
        *slot = Arc::new(graph);
    }
}
