//! Penalty-based K-alternative diversification.
//!
//! After each accepted candidate its edges are penalized and the search
//! re-runs. A new path counts as an alternative only if it shares less
//! than the configured fraction of its edge length with every candidate
//! accepted so far; otherwise the penalty is escalated and the search
//! repeated, up to a bounded number of runs. The total-run cap keeps the
//! request bounded on graphs where no sufficiently distinct alternative
//! exists.

use rustc_hash::{FxHashMap, FxHashSet};
use tokio_util::sync::CancellationToken;

use greenpath_common::{Result, RouteError};

use crate::cost::{CostModel, RoutingProfile};
use crate::graph::{EdgeId, ExposureGraph, NodeId};

use super::dijkstra::{shortest_path, PathFound};
use super::{RouteCandidate, SearchConfig};

#[allow(clippy::too_many_arguments)]
pub(super) fn find_diverse_routes(
    graph: &ExposureGraph,
    cost_model: &CostModel,
    profile: &RoutingProfile,
    origin: NodeId,
    destination: NodeId,
    k: usize,
    config: &SearchConfig,
    cancel: &CancellationToken,
) -> Result<Vec<RouteCandidate>> {
    let mut penalties: FxHashMap<EdgeId, f64> = FxHashMap::default();

    let best = shortest_path(
        graph, cost_model, profile, &penalties, origin, destination, cancel,
    )?
    .ok_or_else(|| RouteError::NoRouteFound {
        from: graph.node(origin).external_id,
        to: graph.node(destination).external_id,
    })?;

    // Same-node snap: there is exactly one (trivial) route.
    if best.edges.is_empty() {
        return Ok(vec![RouteCandidate::build(graph, cost_model, profile, &best)]);
    }

    let mut accepted = vec![best];
    penalize(&mut penalties, &accepted[0], config.penalty_factor);

    let mut runs = 0;
    while accepted.len() < k && runs < config.max_penalty_runs {
        runs += 1;
        let Some(path) = shortest_path(
            graph, cost_model, profile, &penalties, origin, destination, cancel,
        )?
        else {
            break;
        };
        tracing::debug!(
            run = runs,
            penalized_cost = path.penalized_cost,
            edges = path.edges.len(),
            "diversification run"
        );

        if accepted.iter().any(|a| a.edges == path.edges) {
            // Penalties were not yet strong enough to move the search off
            // a known path; escalate and retry.
            penalize(&mut penalties, &path, config.penalty_factor);
            continue;
        }

        let overlap = accepted
            .iter()
            .map(|a| shared_length_fraction(graph, &path, a))
            .fold(0.0f64, f64::max);
        penalize(&mut penalties, &path, config.penalty_factor);
        if overlap < config.max_shared_fraction {
            accepted.push(path);
        }
    }

    let mut candidates: Vec<RouteCandidate> = accepted
        .iter()
        .map(|path| RouteCandidate::build(graph, cost_model, profile, path))
        .collect();
    // Rank by unpenalized cost; equal costs by shorter length.
    candidates.sort_by(|a, b| {
        a.cost
            .partial_cmp(&b.cost)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                a.length_m
                    .partial_cmp(&b.length_m)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    });
    Ok(candidates)
}

fn penalize(penalties: &mut FxHashMap<EdgeId, f64>, path: &PathFound, factor: f64) {
    for &edge in &path.edges {
        *penalties.entry(edge).or_insert(1.0) *= factor;
    }
}

/// Fraction of `path`'s edge length that also appears in `other`.
fn shared_length_fraction(graph: &ExposureGraph, path: &PathFound, other: &PathFound) -> f64 {
    let other_edges: FxHashSet<EdgeId> = other.edges.iter().copied().collect();
    let mut total = 0.0;
    let mut shared = 0.0;
    for &edge_id in &path.edges {
        let length = graph.edge(edge_id).length_m;
        total += length;
        if other_edges.contains(&edge_id) {
            shared += length;
        }
    }
    if total > 0.0 {
        shared / total
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::super::tests::{node, walk_edge};
    use super::*;
    use crate::graph::loader::{build_graph, GraphConfig};
    use crate::graph::TravelMode;

    /// Ladder with three fully disjoint rails between the endpoints.
    fn three_rail_graph() -> ExposureGraph {
        build_graph(
            "t".into(),
            vec![
                node(1, 60.000, 24.000),
                node(2, 60.002, 24.000),
                node(3, 60.001, 23.998),
                node(4, 60.001, 24.000),
                node(5, 60.001, 24.002),
            ],
            vec![
                // rail A: 1-3-2, total 240 m
                walk_edge(10, 1, 3, 120.0, 50.0),
                walk_edge(11, 3, 2, 120.0, 50.0),
                // rail B: 1-4-2, total 220 m (best)
                walk_edge(12, 1, 4, 110.0, 50.0),
                walk_edge(13, 4, 2, 110.0, 50.0),
                // rail C: 1-5-2, total 260 m
                walk_edge(14, 1, 5, 130.0, 50.0),
                walk_edge(15, 5, 2, 130.0, 50.0),
            ],
            GraphConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn finds_disjoint_alternatives_ranked_by_cost() {
        let g = three_rail_graph();
        let cancel = CancellationToken::new();
        let profile = RoutingProfile::new(TravelMode::Walk, 0.0);
        let origin = g.node_by_external_id(1).unwrap();
        let destination = g.node_by_external_id(2).unwrap();

        let routes = find_diverse_routes(
            &g,
            &CostModel::default(),
            &profile,
            origin,
            destination,
            3,
            &SearchConfig::default(),
            &cancel,
        )
        .unwrap();

        assert_eq!(routes.len(), 3);
        let lengths: Vec<f64> = routes.iter().map(|r| r.length_m).collect();
        assert_eq!(lengths, vec![220.0, 240.0, 260.0]);

        // No two candidates share any edge at all here.
        for (i, a) in routes.iter().enumerate() {
            for b in &routes[i + 1..] {
                let shared: Vec<_> = a.edges.iter().filter(|e| b.edges.contains(e)).collect();
                assert!(shared.is_empty());
            }
        }
    }

    #[test]
    fn returns_fewer_candidates_when_no_distinct_alternative_exists() {
        // Single chain: every re-run finds the same path, which the
        // duplicate check rejects until the run budget is exhausted.
        let g = build_graph(
            "t".into(),
            vec![node(1, 60.0, 24.0), node(2, 60.001, 24.0), node(3, 60.002, 24.0)],
            vec![walk_edge(10, 1, 2, 111.0, 50.0), walk_edge(11, 2, 3, 111.0, 50.0)],
            GraphConfig::default(),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let profile = RoutingProfile::new(TravelMode::Walk, 0.0);
        let origin = g.node_by_external_id(1).unwrap();
        let destination = g.node_by_external_id(3).unwrap();

        let routes = find_diverse_routes(
            &g,
            &CostModel::default(),
            &profile,
            origin,
            destination,
            3,
            &SearchConfig::default(),
            &cancel,
        )
        .unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn mostly_overlapping_detour_is_rejected() {
        // The only alternative shares the long approach corridor (over
        // half its length), so K=2 still yields a single candidate.
        let g = build_graph(
            "t".into(),
            vec![
                node(1, 60.000, 24.000),
                node(2, 60.004, 24.000),
                node(3, 60.005, 24.000),
                node(4, 60.0045, 24.001),
            ],
            vec![
                walk_edge(10, 1, 2, 450.0, 50.0), // shared corridor
                walk_edge(11, 2, 3, 100.0, 50.0), // direct finish
                walk_edge(12, 2, 4, 60.0, 50.0),  // detour finish
                walk_edge(13, 4, 3, 60.0, 50.0),
            ],
            GraphConfig::default(),
        )
        .unwrap();
        let cancel = CancellationToken::new();
        let profile = RoutingProfile::new(TravelMode::Walk, 0.0);
        let origin = g.node_by_external_id(1).unwrap();
        let destination = g.node_by_external_id(3).unwrap();

        let config = SearchConfig {
            max_shared_fraction: 0.5,
            ..SearchConfig::default()
        };
        let routes = find_diverse_routes(
            &g,
            &CostModel::default(),
            &profile,
            origin,
            destination,
            2,
            &config,
            &cancel,
        )
        .unwrap();
        // Detour route is 450 + 120 = 570 m, sharing 450/570 ≈ 0.79.
        assert_eq!(routes.len(), 1);
    }
}
