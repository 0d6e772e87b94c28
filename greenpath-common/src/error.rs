//! Error taxonomy for the greenpath routing engine.
//!
//! Severity tiers:
//! - `GraphLoad` is fatal at startup: the process must not serve traffic
//!   with a partially loaded graph.
//! - `UnknownEdge` and `StaleSnapshot` are recoverable refresh failures:
//!   the offending entry or snapshot is skipped and logged, the rest of
//!   the batch proceeds.
//! - `InvalidCoordinate`, `NoRouteFound` and `Cancelled` are scoped to a
//!   single request and surfaced to the caller as typed failures.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure kinds surfaced by the routing engine.
#[derive(Debug, Error)]
pub enum RouteError {
    /// The serialized graph could not be materialized into a usable
    /// exposure graph (unreadable input, malformed records, dangling
    /// edge references).
    #[error("graph load failed: {0}")]
    GraphLoad(String),

    /// An AQI snapshot entry referenced an edge id that does not exist
    /// in the current graph.
    #[error("unknown edge id {0} in AQI snapshot")]
    UnknownEdge(u64),

    /// A snapshot not newer than the currently applied one was rejected
    /// to avoid regressing cost data under out-of-order delivery.
    #[error("stale AQI snapshot: taken at {taken_at}, last applied {last_applied}")]
    StaleSnapshot {
        taken_at: DateTime<Utc>,
        last_applied: DateTime<Utc>,
    },

    /// The coordinate could not be snapped to any graph node within the
    /// maximum snap distance.
    #[error("coordinate ({lat}, {lon}) is farther than {max_distance_m} m from any graph node")]
    InvalidCoordinate {
        lat: f64,
        lon: f64,
        max_distance_m: f64,
    },

    /// The destination is unreachable from the origin. Node ids are the
    /// stable external ids of the snapped endpoints.
    #[error("no route found from node {from} to node {to}")]
    NoRouteFound { from: u64, to: u64 },

    /// The caller abandoned the request. Normal early termination, not
    /// an error metric.
    #[error("route request cancelled")]
    Cancelled,
}

impl RouteError {
    /// `true` for failures that are scoped to a single request or a
    /// single snapshot entry and must never take the process down.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RouteError::GraphLoad(_))
    }
}

pub type Result<T> = std::result::Result<T, RouteError>;
