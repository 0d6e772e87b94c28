//! Multi-criteria path search: label-setting Dijkstra over the exposure
//! graph with penalty-based diversification for K alternatives.
//!
//! Edge costs from the cost model are strictly positive, so a plain
//! label-setting search is correct; no negative-weight handling is
//! needed. A search is pure computation over the graph instance it was
//! handed: it never blocks on a concurrent AQI refresh and observes
//! whatever per-edge values are visible at each read.

mod alternatives;
mod dijkstra;

use tokio_util::sync::CancellationToken;

use greenpath_common::Result;

use crate::cost::{CostModel, RoutingProfile};
use crate::graph::{EdgeId, ExposureGraph, NodeId, NEUTRAL_AQI};

use self::dijkstra::PathFound;

/// Search policy knobs.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Default number of alternatives when the request leaves K unset,
    /// and the cap on requested K.
    pub max_candidates: usize,
    /// Multiplier (> 1) applied to the edges of found paths between
    /// diversification runs.
    pub penalty_factor: f64,
    /// A candidate is accepted only if it shares less than this fraction
    /// of its edge length with every previously accepted candidate.
    pub max_shared_fraction: f64,
    /// Hard cap on penalized re-runs per request, so pathological graphs
    /// cannot drag a search out indefinitely. Fewer than K candidates may
    /// legitimately be returned.
    pub max_penalty_runs: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_candidates: 3,
            penalty_factor: 1.4,
            max_shared_fraction: 0.5,
            max_penalty_runs: 8,
        }
    }
}

/// One ranked route with its per-dimension exposure aggregates.
#[derive(Debug, Clone)]
pub struct RouteCandidate {
    /// Node sequence from origin to destination.
    pub nodes: Vec<NodeId>,
    /// Edge sequence; empty when origin and destination snap to the same
    /// node.
    pub edges: Vec<EdgeId>,
    pub length_m: f64,
    /// Length-weighted mean noise level along the route, dB.
    pub mean_noise_db: f64,
    /// Length-weighted mean vegetation share, in [0, 1].
    pub mean_greenery: f64,
    /// Length-weighted mean AQI as read during aggregation.
    pub mean_aqi: f64,
    /// Unpenalized total cost under the request profile; the ranking key.
    pub cost: f64,
}

impl RouteCandidate {
    fn build(
        graph: &ExposureGraph,
        model: &CostModel,
        profile: &RoutingProfile,
        path: &PathFound,
    ) -> Self {
        let mut length = 0.0;
        let mut noise = 0.0;
        let mut green = 0.0;
        let mut aqi = 0.0;
        let mut cost = 0.0;
        for &edge_id in &path.edges {
            let edge = graph.edge(edge_id);
            let edge_aqi = graph.edge_aqi(edge_id);
            length += edge.length_m;
            noise += edge.noise_db as f64 * edge.length_m;
            green += edge.greenery_ratio as f64 * edge.length_m;
            aqi += edge_aqi as f64 * edge.length_m;
            cost += model.edge_cost(edge, edge_aqi, profile);
        }
        let (mean_noise_db, mean_greenery, mean_aqi) = if length > 0.0 {
            (noise / length, green / length, aqi / length)
        } else {
            (0.0, 0.0, NEUTRAL_AQI as f64)
        };
        Self {
            nodes: path.nodes.clone(),
            edges: path.edges.clone(),
            length_m: length,
            mean_noise_db,
            mean_greenery,
            mean_aqi,
            cost,
        }
    }
}

/// The path engine. Cheap to clone; holds no per-request state.
#[derive(Debug, Clone)]
pub struct PathEngine {
    cost: CostModel,
    config: SearchConfig,
}

impl PathEngine {
    pub fn new(cost: CostModel, config: SearchConfig) -> Self {
        Self { cost, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    /// Find up to `k` diverse route candidates between two coordinates,
    /// ranked by total cost ascending.
    ///
    /// Fails with `InvalidCoordinate` when an endpoint cannot be snapped,
    /// `NoRouteFound` when the destination is unreachable, and
    /// `Cancelled` when the token fires mid-search. `k` is clamped to
    /// `[1, config.max_candidates]`.
    pub fn find_routes(
        &self,
        graph: &ExposureGraph,
        origin: (f64, f64),
        destination: (f64, f64),
        profile: &RoutingProfile,
        k: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RouteCandidate>> {
        let origin_node = graph.nearest_node(origin.0, origin.1)?;
        let destination_node = graph.nearest_node(destination.0, destination.1)?;
        let k = k.clamp(1, self.config.max_candidates.max(1));
        alternatives::find_diverse_routes(
            graph,
            &self.cost,
            profile,
            origin_node,
            destination_node,
            k,
            &self.config,
            cancel,
        )
    }
}
