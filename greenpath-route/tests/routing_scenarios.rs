//! End-to-end routing scenarios over small hand-built graphs.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use greenpath_common::RouteError;
use greenpath_route::graph::loader::{build_graph, EdgeRecord, GraphConfig, NodeRecord};
use greenpath_route::graph::ExposureGraph;
use greenpath_route::{
    CostModel, PathEngine, RoutingProfile, SearchConfig, TravelMode,
};

fn node(id: u64, lat: f64, lon: f64) -> NodeRecord {
    NodeRecord { id, lat, lon }
}

#[allow(clippy::too_many_arguments)]
fn edge(
    id: u64,
    from: u64,
    to: u64,
    length_m: f64,
    noise_db: f32,
    greenery_ratio: f32,
) -> EdgeRecord {
    EdgeRecord {
        id,
        from,
        to,
        length_m,
        mode: TravelMode::Walk,
        noise_db,
        greenery_ratio,
    }
}

fn engine() -> PathEngine {
    PathEngine::new(CostModel::default(), SearchConfig::default())
}

fn external_path(graph: &ExposureGraph, nodes: &[u32]) -> Vec<u64> {
    nodes.iter().map(|&n| graph.node(n).external_id).collect()
}

/// Straight chain 1-2-3-4-5, 100 m per hop, with a loud middle edge
/// (2-3 at 75 dB) and everything else at 45 dB.
fn noisy_chain() -> ExposureGraph {
    build_graph(
        "chain".into(),
        vec![
            node(1, 60.0000, 24.0),
            node(2, 60.0009, 24.0),
            node(3, 60.0018, 24.0),
            node(4, 60.0027, 24.0),
            node(5, 60.0036, 24.0),
        ],
        vec![
            edge(10, 1, 2, 100.0, 45.0, 0.0),
            edge(11, 2, 3, 100.0, 75.0, 0.0),
            edge(12, 3, 4, 100.0, 45.0, 0.0),
            edge(13, 4, 5, 100.0, 45.0, 0.0),
        ],
        GraphConfig::default(),
    )
    .unwrap()
}

/// The chain above plus a quiet, green detour 2-6-3 around the loud edge.
fn chain_with_detour() -> ExposureGraph {
    build_graph(
        "chain+detour".into(),
        vec![
            node(1, 60.0000, 24.0),
            node(2, 60.0009, 24.0),
            node(3, 60.0018, 24.0),
            node(4, 60.0027, 24.0),
            node(5, 60.0036, 24.0),
            node(6, 60.00135, 24.001),
        ],
        vec![
            edge(10, 1, 2, 100.0, 45.0, 0.0),
            edge(11, 2, 3, 100.0, 75.0, 0.0),
            edge(12, 3, 4, 100.0, 45.0, 0.0),
            edge(13, 4, 5, 100.0, 45.0, 0.0),
            edge(14, 2, 6, 100.0, 45.0, 0.6),
            edge(15, 6, 3, 100.0, 45.0, 0.6),
        ],
        GraphConfig::default(),
    )
    .unwrap()
}

const CHAIN_ENDS: ((f64, f64), (f64, f64)) = ((60.0000, 24.0), (60.0036, 24.0));

#[test]
fn sensitivity_zero_returns_the_shortest_distance_path() {
    let graph = noisy_chain();
    let profile = RoutingProfile::new(TravelMode::Walk, 0.0);
    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &profile, 1, &CancellationToken::new())
        .unwrap();
    assert_eq!(external_path(&graph, &routes[0].nodes), vec![1, 2, 3, 4, 5]);
    assert_eq!(routes[0].length_m, 400.0);
    // Cost degenerates to plain length.
    assert!((routes[0].cost - 400.0).abs() < 1e-9);
}

#[test]
fn without_an_alternative_the_loud_edge_is_reported_not_avoided() {
    let graph = noisy_chain();
    let sensitive = RoutingProfile::new(TravelMode::Walk, 1.0);
    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &sensitive, 1, &CancellationToken::new())
        .unwrap();
    // Only one path exists; it is returned with its true exposure.
    assert_eq!(external_path(&graph, &routes[0].nodes), vec![1, 2, 3, 4, 5]);
    assert!((routes[0].mean_noise_db - 52.5).abs() < 1e-9);
}

#[test]
fn full_sensitivity_takes_the_quiet_detour_when_one_exists() {
    let graph = chain_with_detour();

    let shortest = RoutingProfile::new(TravelMode::Walk, 0.0);
    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &shortest, 1, &CancellationToken::new())
        .unwrap();
    assert_eq!(external_path(&graph, &routes[0].nodes), vec![1, 2, 3, 4, 5]);

    let sensitive = RoutingProfile::new(TravelMode::Walk, 1.0);
    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &sensitive, 1, &CancellationToken::new())
        .unwrap();
    assert_eq!(
        external_path(&graph, &routes[0].nodes),
        vec![1, 2, 6, 3, 4, 5]
    );
    assert_eq!(routes[0].length_m, 500.0);
    assert!(routes[0].mean_noise_db < 52.5);
}

#[test]
fn raising_sensitivity_never_trades_both_length_and_exposure_for_the_worse() {
    let graph = chain_with_detour();
    let mut last_length = 0.0f64;
    let mut last_noise = f64::INFINITY;
    for sensitivity in [0.0, 0.25, 0.5, 0.75, 1.0] {
        let profile = RoutingProfile::new(TravelMode::Walk, sensitivity);
        let routes = engine()
            .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &profile, 1, &CancellationToken::new())
            .unwrap();
        let winner = &routes[0];
        // Chosen routes may get longer, but only in exchange for lower
        // exposure; they never get longer *and* louder.
        assert!(winner.length_m >= last_length);
        assert!(winner.mean_noise_db <= last_noise);
        last_length = winner.length_m;
        last_noise = winner.mean_noise_db;
    }
}

// ---------------------------------------------------------------------------
// AQI refresh scenarios
// ---------------------------------------------------------------------------

/// Chain with a short clean detour 2-6-3 (60 m per hop), all edges
/// equally quiet. Air quality alone decides the winner.
fn chain_with_short_detour() -> ExposureGraph {
    build_graph(
        "aqi-chain".into(),
        vec![
            node(1, 60.0000, 24.0),
            node(2, 60.0009, 24.0),
            node(3, 60.0018, 24.0),
            node(4, 60.0027, 24.0),
            node(5, 60.0036, 24.0),
            node(6, 60.00135, 24.0005),
        ],
        vec![
            edge(10, 1, 2, 100.0, 45.0, 0.0),
            edge(11, 2, 3, 100.0, 45.0, 0.0),
            edge(12, 3, 4, 100.0, 45.0, 0.0),
            edge(13, 4, 5, 100.0, 45.0, 0.0),
            edge(14, 2, 6, 60.0, 45.0, 0.0),
            edge(15, 6, 3, 60.0, 45.0, 0.0),
        ],
        GraphConfig::default(),
    )
    .unwrap()
}

#[test]
fn polluted_edge_is_avoided_and_ranking_restored_after_reset() {
    let graph = chain_with_short_detour();
    let sensitive = RoutingProfile::new(TravelMode::Walk, 1.0);
    let cancel = CancellationToken::new();

    // Clean air everywhere: the direct chain wins on distance.
    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &sensitive, 1, &cancel)
        .unwrap();
    assert_eq!(external_path(&graph, &routes[0].nodes), vec![1, 2, 3, 4, 5]);

    // Very poor air on the direct middle edge: detour wins.
    let mut values = FxHashMap::default();
    values.insert(11u64, 5.0f32);
    let outcome = graph.apply_aqi_snapshot(&values);
    assert_eq!(outcome.applied, 1);

    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &sensitive, 1, &cancel)
        .unwrap();
    assert_eq!(
        external_path(&graph, &routes[0].nodes),
        vec![1, 2, 6, 3, 4, 5]
    );
    assert!(routes[0].mean_aqi < 5.0);

    // Reset to neutral: original ranking restored.
    values.insert(11u64, 1.0f32);
    graph.apply_aqi_snapshot(&values);
    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &sensitive, 1, &cancel)
        .unwrap();
    assert_eq!(external_path(&graph, &routes[0].nodes), vec![1, 2, 3, 4, 5]);

    // Sensitivity 0 ignores air quality entirely.
    values.insert(11u64, 5.0f32);
    graph.apply_aqi_snapshot(&values);
    let shortest = RoutingProfile::new(TravelMode::Walk, 0.0);
    let routes = engine()
        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &shortest, 1, &cancel)
        .unwrap();
    assert_eq!(external_path(&graph, &routes[0].nodes), vec![1, 2, 3, 4, 5]);
}

#[test]
fn queries_stay_valid_while_snapshots_land_concurrently() {
    // Per-edge atomicity only: a search overlapping a refresh may mix
    // pre- and post-refresh values across edges. Every result must still
    // be one of the two structurally valid paths with a positive cost.
    let graph = Arc::new(chain_with_short_detour());
    let sensitive = RoutingProfile::new(TravelMode::Walk, 1.0);

    let writer = {
        let graph = Arc::clone(&graph);
        std::thread::spawn(move || {
            for round in 0..200 {
                let mut values = FxHashMap::default();
                values.insert(11u64, if round % 2 == 0 { 5.0f32 } else { 1.0f32 });
                graph.apply_aqi_snapshot(&values);
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let graph = Arc::clone(&graph);
            std::thread::spawn(move || {
                let engine = engine();
                let cancel = CancellationToken::new();
                for _ in 0..50 {
                    let routes = engine
                        .find_routes(&graph, CHAIN_ENDS.0, CHAIN_ENDS.1, &sensitive, 1, &cancel)
                        .unwrap();
                    let path = external_path(&graph, &routes[0].nodes);
                    assert!(
                        path == vec![1, 2, 3, 4, 5] || path == vec![1, 2, 6, 3, 4, 5],
                        "unexpected path {path:?}"
                    );
                    assert!(routes[0].cost > 0.0);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

// ---------------------------------------------------------------------------
// Diversity
// ---------------------------------------------------------------------------

#[test]
fn alternatives_respect_the_shared_length_bound() {
    // Three disjoint rails between the endpoints.
    let graph = build_graph(
        "rails".into(),
        vec![
            node(1, 60.000, 24.000),
            node(2, 60.002, 24.000),
            node(3, 60.001, 23.998),
            node(4, 60.001, 24.000),
            node(5, 60.001, 24.002),
        ],
        vec![
            edge(10, 1, 3, 120.0, 45.0, 0.0),
            edge(11, 3, 2, 120.0, 45.0, 0.0),
            edge(12, 1, 4, 110.0, 45.0, 0.0),
            edge(13, 4, 2, 110.0, 45.0, 0.0),
            edge(14, 1, 5, 130.0, 45.0, 0.0),
            edge(15, 5, 2, 130.0, 45.0, 0.0),
        ],
        GraphConfig::default(),
    )
    .unwrap();

    let config = SearchConfig::default();
    let max_shared = config.max_shared_fraction;
    let engine = PathEngine::new(CostModel::default(), config);
    let profile = RoutingProfile::new(TravelMode::Walk, 0.0);
    let routes = engine
        .find_routes(
            &graph,
            (60.000, 24.000),
            (60.002, 24.000),
            &profile,
            3,
            &CancellationToken::new(),
        )
        .unwrap();

    assert_eq!(routes.len(), 3);
    // Ranked by cost ascending.
    assert!(routes.windows(2).all(|w| w[0].cost <= w[1].cost));

    for (i, a) in routes.iter().enumerate() {
        for b in &routes[i + 1..] {
            let b_edges: std::collections::HashSet<_> = b.edges.iter().collect();
            let shared: f64 = a
                .edges
                .iter()
                .filter(|e| b_edges.contains(e))
                .map(|&e| graph.edge(e).length_m)
                .sum();
            assert!(
                shared / a.length_m < max_shared,
                "candidates share {shared} of {} m",
                a.length_m
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Failure surfaces
// ---------------------------------------------------------------------------

#[test]
fn unreachable_destination_is_a_typed_failure() {
    // Node 3 is an island within snap range of the query point.
    let graph = build_graph(
        "island".into(),
        vec![
            node(1, 60.0000, 24.0),
            node(2, 60.0009, 24.0),
            node(3, 60.0100, 24.0),
        ],
        vec![edge(10, 1, 2, 100.0, 45.0, 0.0)],
        GraphConfig::default(),
    )
    .unwrap();
    let profile = RoutingProfile::new(TravelMode::Walk, 0.0);
    let err = engine()
        .find_routes(
            &graph,
            (60.0000, 24.0),
            (60.0100, 24.0),
            &profile,
            1,
            &CancellationToken::new(),
        )
        .unwrap_err();
    assert!(matches!(err, RouteError::NoRouteFound { from: 1, to: 3 }));
}

#[test]
fn coordinate_outside_snap_range_is_rejected() {
    let graph = noisy_chain();
    let profile = RoutingProfile::new(TravelMode::Walk, 0.0);
    let err = engine()
        .find_routes(
            &graph,
            (62.0, 27.0),
            (60.0036, 24.0),
            &profile,
            1,
            &CancellationToken::new(),
        )
        .unwrap_err();
    match err {
        RouteError::InvalidCoordinate { lat, .. } => assert_eq!(lat, 62.0),
        other => panic!("expected InvalidCoordinate, got {other}"),
    }
}
