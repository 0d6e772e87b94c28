//! Live AQI refresh: converts zone-level snapshots into per-edge AQI
//! costs and commits them to the exposure graph.
//!
//! The coordinator is the only writer of the mutable AQI field. Commits
//! are per-edge atomic stores, so concurrent searches are never blocked
//! and never observe a torn value; a search overlapping a refresh may see
//! a mix of pre- and post-refresh values across different edges, which is
//! an accepted trade-off at city scale. Zone-to-edge attribution is an
//! injected strategy so the external attribution data can be swapped
//! without touching the coordinator.

mod source;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use greenpath_common::{Result, RouteError};

use crate::graph::{GraphHandle, SnapshotOutcome};

pub use source::{AqiSource, FileAqiSource};

/// One AQI snapshot from the ingestion side: zone (or edge) identifiers
/// mapped to raw AQI values, stamped with the provider's observation
/// time.
#[derive(Debug, Clone)]
pub struct AqiSnapshot {
    pub taken_at: DateTime<Utc>,
    pub values: FxHashMap<String, f32>,
}

/// Converts a zone-keyed AQI map into an edge-keyed one (external edge
/// ids). Injected into the coordinator as a replaceable strategy.
pub trait ZoneAttribution: Send + Sync {
    fn attribute(&self, zones: &FxHashMap<String, f32>) -> FxHashMap<u64, f32>;
}

/// Snapshot keys are already external edge ids, rendered as decimal
/// strings. Entries that do not parse are dropped with a warning.
#[derive(Debug, Default)]
pub struct DirectEdgeAttribution;

impl ZoneAttribution for DirectEdgeAttribution {
    fn attribute(&self, zones: &FxHashMap<String, f32>) -> FxHashMap<u64, f32> {
        let mut edges = FxHashMap::default();
        for (key, &value) in zones {
            match key.parse::<u64>() {
                Ok(edge_id) => {
                    edges.insert(edge_id, value);
                }
                Err(_) => {
                    tracing::warn!(zone = %key, "snapshot key is not an edge id, dropping entry");
                }
            }
        }
        edges
    }
}

/// Table-driven attribution: each zone maps to the edges it covers, and
/// every member edge receives the zone's value. Zones missing from the
/// table are dropped with a warning.
#[derive(Debug, Default)]
pub struct ZoneTableAttribution {
    members: FxHashMap<String, Vec<u64>>,
}

impl ZoneTableAttribution {
    pub fn new(members: FxHashMap<String, Vec<u64>>) -> Self {
        Self { members }
    }
}

impl ZoneAttribution for ZoneTableAttribution {
    fn attribute(&self, zones: &FxHashMap<String, f32>) -> FxHashMap<u64, f32> {
        let mut edges = FxHashMap::default();
        for (zone, &value) in zones {
            match self.members.get(zone) {
                Some(member_edges) => {
                    for &edge in member_edges {
                        edges.insert(edge, value);
                    }
                }
                None => {
                    tracing::warn!(zone = %zone, "zone not in attribution table, dropping entry");
                }
            }
        }
        edges
    }
}

/// Refresh bookkeeping exposed through the health endpoint.
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    pub last_applied: Option<DateTime<Utc>>,
    pub applied_edges: usize,
    pub skipped_edges: usize,
}

pub struct RefreshCoordinator {
    graph: GraphHandle,
    attribution: Box<dyn ZoneAttribution>,
    // Also serializes direct `apply` callers; the background loop is
    // single-task by construction.
    status: Mutex<RefreshStatus>,
}

impl RefreshCoordinator {
    pub fn new(graph: GraphHandle, attribution: Box<dyn ZoneAttribution>) -> Self {
        Self {
            graph,
            attribution,
            status: Mutex::new(RefreshStatus::default()),
        }
    }

    /// Apply one snapshot. Rejects snapshots not newer than the last
    /// applied one (`StaleSnapshot`), which also makes replaying a
    /// snapshot a no-op on graph state. Unknown edges inside the batch
    /// are logged and skipped; the rest of the batch is committed.
    pub fn apply(&self, snapshot: &AqiSnapshot) -> Result<SnapshotOutcome> {
        let mut status = self.status.lock();
        if let Some(last_applied) = status.last_applied {
            if snapshot.taken_at <= last_applied {
                return Err(RouteError::StaleSnapshot {
                    taken_at: snapshot.taken_at,
                    last_applied,
                });
            }
        }

        let edge_values = self.attribution.attribute(&snapshot.values);
        let graph = self.graph.current();
        let outcome = graph.apply_aqi_snapshot(&edge_values);

        status.last_applied = Some(snapshot.taken_at);
        status.applied_edges = outcome.applied;
        status.skipped_edges = outcome.unknown.len();
        tracing::info!(
            taken_at = %snapshot.taken_at,
            applied = outcome.applied,
            skipped = outcome.unknown.len(),
            "AQI snapshot applied"
        );
        Ok(outcome)
    }

    pub fn status(&self) -> RefreshStatus {
        self.status.lock().clone()
    }
}

/// Spawn the single recurring refresh task: poll `source` every `every`,
/// apply whatever it yields, stop when `shutdown` flips. The loop body is
/// sequential, so a refresh in progress suppresses the next tick rather
/// than running concurrently with itself.
pub fn spawn_refresh_loop(
    coordinator: Arc<RefreshCoordinator>,
    source: Arc<dyn AqiSource>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match source.poll() {
                        Ok(Some(snapshot)) => match coordinator.apply(&snapshot) {
                            Ok(_) => {}
                            Err(err @ RouteError::StaleSnapshot { .. }) => {
                                tracing::warn!(error = %err, "snapshot rejected");
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "AQI refresh failed");
                            }
                        },
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(error = %err, "AQI source poll failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("AQI refresh loop shutting down");
                    break;
                }
            }
        }
    })
}
