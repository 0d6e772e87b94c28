//! Shared server state.
//!
//! Handlers pull the current graph instance from the handle once per
//! request; a reload swaps the handle's inner instance without touching
//! requests already in flight.

use std::sync::Arc;

use crate::graph::GraphHandle;
use crate::refresh::RefreshCoordinator;
use crate::search::PathEngine;

pub struct AppState {
    pub graph: GraphHandle,
    pub engine: PathEngine,
    pub coordinator: Arc<RefreshCoordinator>,
}

impl AppState {
    pub fn new(graph: GraphHandle, engine: PathEngine, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            graph,
            engine,
            coordinator,
        }
    }
}
