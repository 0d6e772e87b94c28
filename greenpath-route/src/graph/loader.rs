//! Graph materialization from the serialized node and edge lists produced
//! by the external graph-construction pipeline.
//!
//! The input is a single JSON document with stable ids. The loader fails
//! fast on anything that would leave the graph partially usable: missing
//! fields, duplicate ids, dangling edge references, non-finite numbers.
//! A process must not serve traffic over a graph that failed to load.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use greenpath_common::{Result, RouteError};

use super::{Edge, EdgeId, ExposureGraph, Node, NodeId, TravelMode, DEFAULT_MAX_SNAP_DISTANCE_M};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: u64,
    pub from: u64,
    pub to: u64,
    pub length_m: f64,
    pub mode: TravelMode,
    pub noise_db: f32,
    pub greenery_ratio: f32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GraphFile {
    pub version: String,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// Load-time knobs that are policy, not data.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    pub max_snap_distance_m: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_snap_distance_m: DEFAULT_MAX_SNAP_DISTANCE_M,
        }
    }
}

/// Read and materialize a graph file.
pub fn load_graph(path: &Path, config: GraphConfig) -> Result<ExposureGraph> {
    let file = File::open(path)
        .map_err(|e| RouteError::GraphLoad(format!("cannot open {}: {e}", path.display())))?;
    let parsed: GraphFile = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| RouteError::GraphLoad(format!("cannot parse {}: {e}", path.display())))?;
    let graph = build_graph(parsed.version, parsed.nodes, parsed.edges, config)?;
    tracing::info!(
        version = %graph.version(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "exposure graph loaded"
    );
    Ok(graph)
}

/// Materialize a graph from in-memory records. Used by the file loader
/// and directly by embedders and tests.
pub fn build_graph(
    version: String,
    node_records: Vec<NodeRecord>,
    edge_records: Vec<EdgeRecord>,
    config: GraphConfig,
) -> Result<ExposureGraph> {
    if node_records.is_empty() {
        return Err(RouteError::GraphLoad("graph has no nodes".into()));
    }

    let mut nodes = Vec::with_capacity(node_records.len());
    let mut node_ids = FxHashMap::default();
    for record in node_records {
        if !record.lat.is_finite() || !record.lon.is_finite() {
            return Err(RouteError::GraphLoad(format!(
                "node {} has a non-finite coordinate",
                record.id
            )));
        }
        let id = nodes.len() as NodeId;
        if node_ids.insert(record.id, id).is_some() {
            return Err(RouteError::GraphLoad(format!("duplicate node id {}", record.id)));
        }
        nodes.push(Node {
            external_id: record.id,
            lat: record.lat,
            lon: record.lon,
        });
    }

    let mut edges = Vec::with_capacity(edge_records.len());
    let mut edge_ids = FxHashMap::default();
    for record in edge_records {
        let from = *node_ids.get(&record.from).ok_or_else(|| {
            RouteError::GraphLoad(format!(
                "edge {} references missing node {}",
                record.id, record.from
            ))
        })?;
        let to = *node_ids.get(&record.to).ok_or_else(|| {
            RouteError::GraphLoad(format!(
                "edge {} references missing node {}",
                record.id, record.to
            ))
        })?;
        if !record.length_m.is_finite() || record.length_m < 0.0 {
            return Err(RouteError::GraphLoad(format!(
                "edge {} has invalid length {}",
                record.id, record.length_m
            )));
        }
        let id = edges.len() as EdgeId;
        if edge_ids.insert(record.id, id).is_some() {
            return Err(RouteError::GraphLoad(format!("duplicate edge id {}", record.id)));
        }
        edges.push(Edge {
            external_id: record.id,
            from,
            to,
            length_m: record.length_m,
            mode: record.mode,
            noise_db: record.noise_db,
            // Out-of-range raster artifacts are clamped, not rejected.
            greenery_ratio: record.greenery_ratio.clamp(0.0, 1.0),
        });
    }

    let (out_offsets, out_edges) = build_adjacency(nodes.len(), &edges);

    Ok(ExposureGraph::from_parts(
        version,
        nodes,
        edges,
        out_offsets,
        out_edges,
        node_ids,
        edge_ids,
        config.max_snap_distance_m,
    ))
}

/// Two-pass CSR construction: count outdegrees, prefix-sum into offsets,
/// then fill edge slots in insertion order.
fn build_adjacency(n_nodes: usize, edges: &[Edge]) -> (Vec<u32>, Vec<EdgeId>) {
    let mut counts = vec![0u32; n_nodes];
    for edge in edges {
        counts[edge.from as usize] += 1;
    }

    let mut offsets = Vec::with_capacity(n_nodes + 1);
    let mut offset = 0u32;
    for &count in &counts {
        offsets.push(offset);
        offset += count;
    }
    offsets.push(offset);

    let mut out_edges = vec![0 as EdgeId; edges.len()];
    counts.fill(0);
    for (id, edge) in edges.iter().enumerate() {
        let from = edge.from as usize;
        let pos = offsets[from] + counts[from];
        out_edges[pos as usize] = id as EdgeId;
        counts[from] += 1;
    }

    (offsets, out_edges)
}
