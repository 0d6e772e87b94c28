//! Exposure-aware route planning over a multimodal street graph.
//!
//! The engine trades travel distance against environmental exposure
//! (traffic noise, air pollution, lack of vegetation). Topology and the
//! static exposure attributes are immutable after load; air-quality
//! costs are refreshed in place by a background coordinator while route
//! queries keep running against the same graph instance.

pub mod cli;
pub mod cost;
pub mod geo;
pub mod graph;
pub mod refresh;
pub mod search;
pub mod server;

pub use cost::{CostModel, CostWeights, RoutingProfile};
pub use graph::{ExposureGraph, GraphHandle, TravelMode};
pub use search::{PathEngine, RouteCandidate, SearchConfig};
