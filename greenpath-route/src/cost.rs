//! Edge cost blending: distance against normalized exposure dimensions.
//!
//! The blend is a pure function of an edge's static attributes, its
//! current AQI value and a routing profile, so the search can call it
//! freely during exploration. Raw dimensions live in incompatible units
//! (meters, decibels, an air-quality index, a vegetation ratio); each is
//! mapped onto [0, 1] against fixed reference bounds before weighting.
//! Out-of-range raw values are clamped, not rejected.

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, TravelMode};

/// Edge cost never drops below this fraction of the edge length, however
/// green the edge. Strictly positive edge costs are required for the
/// label-setting search to be correct.
pub const COST_FLOOR_FACTOR: f64 = 0.1;

/// Absolute floor for degenerate zero-length edges.
const MIN_EDGE_COST: f64 = 1e-3;

/// Blend weights and normalization bounds.
///
/// The reference bounds come from the scales of the source data: traffic
/// noise is modeled over the 40-75 dB band (below 40 dB is treated as
/// quiet), and the air-quality index runs 1 (good) to 5 (very poor).
/// The weights themselves are policy and deliberately configuration, not
/// constants; behavior is pinned down by the monotonicity properties in
/// the test suite rather than by exact numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostWeights {
    pub noise: f64,
    pub air: f64,
    pub green: f64,
    pub noise_db_bounds: (f64, f64),
    pub aqi_bounds: (f64, f64),
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            noise: 1.0,
            air: 1.0,
            green: 0.5,
            noise_db_bounds: (40.0, 75.0),
            aqi_bounds: (1.0, 5.0),
        }
    }
}

/// Per-request routing configuration: travel mode plus the exposure
/// sensitivity. Sensitivity 0 is a plain shortest path; 1 is
/// exposure-dominant.
#[derive(Debug, Clone, Copy)]
pub struct RoutingProfile {
    pub mode: TravelMode,
    sensitivity: f64,
}

impl RoutingProfile {
    pub fn new(mode: TravelMode, sensitivity: f64) -> Self {
        Self {
            mode,
            sensitivity: sensitivity.clamp(0.0, 1.0),
        }
    }

    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }
}

#[derive(Debug, Clone)]
pub struct CostModel {
    weights: CostWeights,
}

impl CostModel {
    /// Negative weights would let a dimension subsidize length below the
    /// positivity floor in surprising ways; they are clamped to zero.
    pub fn new(mut weights: CostWeights) -> Self {
        weights.noise = weights.noise.max(0.0);
        weights.air = weights.air.max(0.0);
        weights.green = weights.green.max(0.0);
        Self { weights }
    }

    pub fn weights(&self) -> &CostWeights {
        &self.weights
    }

    /// Scalar traversal cost of an edge under the given profile.
    ///
    /// `cost = length * (1 + s * (w_n * norm(noise) + w_a * norm(aqi)
    ///                            - w_g * greenery))`,
    /// clamped so it never drops below `COST_FLOOR_FACTOR * length`.
    pub fn edge_cost(&self, edge: &Edge, aqi: f32, profile: &RoutingProfile) -> f64 {
        let w = &self.weights;
        let exposure = w.noise * normalize(edge.noise_db as f64, w.noise_db_bounds)
            + w.air * normalize(aqi as f64, w.aqi_bounds)
            - w.green * edge.greenery_ratio as f64;
        let cost = edge.length_m * (1.0 + profile.sensitivity() * exposure);
        let floor = if edge.length_m > 0.0 {
            COST_FLOOR_FACTOR * edge.length_m
        } else {
            MIN_EDGE_COST
        };
        cost.max(floor)
    }

    /// Normalized air-quality contribution of a raw AQI value, exposed
    /// for per-route exposure aggregates.
    pub fn norm_aqi(&self, aqi: f32) -> f64 {
        normalize(aqi as f64, self.weights.aqi_bounds)
    }

    /// Normalized noise contribution of a raw dB level.
    pub fn norm_noise(&self, noise_db: f32) -> f64 {
        normalize(noise_db as f64, self.weights.noise_db_bounds)
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::new(CostWeights::default())
    }
}

fn normalize(value: f64, (lo, hi): (f64, f64)) -> f64 {
    if hi <= lo {
        return 0.0;
    }
    ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
}
