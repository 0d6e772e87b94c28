//! HTTP API handlers with Axum and Utoipa.
//!
//! Error responses map 1:1 to the engine's failure kinds; a failure in
//! one request never affects another. The CPU-bound search runs on the
//! blocking pool with a cancellation token that fires if the client goes
//! away before the search finishes.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use greenpath_common::RouteError;

use crate::cost::RoutingProfile;
use crate::graph::{ExposureGraph, TravelMode};
use crate::search::RouteCandidate;

use super::state::AppState;

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(find_paths, health),
    components(schemas(PathsResponse, RouteDto, HealthResponse, ErrorResponse)),
    info(
        title = "Greenpath Route API",
        description = "Exposure-aware route planning over a multimodal street graph"
    )
)]
struct ApiDoc;

/// Build the Axum router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/paths", get(find_paths))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .with_state(state)
}

// ============ Paths Endpoint ============

#[derive(Debug, Deserialize, ToSchema)]
pub struct PathsRequest {
    /// Origin latitude
    src_lat: f64,
    /// Origin longitude
    src_lon: f64,
    /// Destination latitude
    dst_lat: f64,
    /// Destination longitude
    dst_lon: f64,
    /// Travel mode: walk, bike, or transit
    mode: String,
    /// Exposure sensitivity in [0, 1]; 0 routes by distance alone
    sensitivity: f64,
    /// Number of alternatives to return (default and cap from server
    /// configuration)
    k: Option<usize>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PathsResponse {
    /// Route candidates, best first
    pub routes: Vec<RouteDto>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteDto {
    /// Total length in meters
    pub length_m: f64,
    /// Scalar cost that ranked this candidate
    pub cost: f64,
    /// Length-weighted mean noise level, dB
    pub mean_noise_db: f64,
    /// Length-weighted mean vegetation share, [0, 1]
    pub mean_greenery: f64,
    /// Length-weighted mean air-quality index, 1-5
    pub mean_aqi: f64,
    /// Stable node ids from origin to destination
    pub nodes: Vec<u64>,
}

impl RouteDto {
    fn from_candidate(graph: &ExposureGraph, candidate: &RouteCandidate) -> Self {
        Self {
            length_m: candidate.length_m,
            cost: candidate.cost,
            mean_noise_db: candidate.mean_noise_db,
            mean_greenery: candidate.mean_greenery,
            mean_aqi: candidate.mean_aqi,
            nodes: candidate
                .nodes
                .iter()
                .map(|&n| graph.node(n).external_id)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Find up to K exposure-aware route alternatives between two coordinates
#[utoipa::path(
    get,
    path = "/paths",
    params(
        ("src_lat" = f64, Query, description = "Origin latitude"),
        ("src_lon" = f64, Query, description = "Origin longitude"),
        ("dst_lat" = f64, Query, description = "Destination latitude"),
        ("dst_lon" = f64, Query, description = "Destination longitude"),
        ("mode" = String, Query, description = "Travel mode: walk, bike, transit"),
        ("sensitivity" = f64, Query, description = "Exposure sensitivity in [0, 1]"),
        ("k" = Option<usize>, Query, description = "Number of alternatives"),
    ),
    responses(
        (status = 200, description = "Ranked route candidates", body = PathsResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 404, description = "No route found", body = ErrorResponse),
    )
)]
async fn find_paths(
    State(state): State<Arc<AppState>>,
    Query(req): Query<PathsRequest>,
) -> Response {
    let Some(mode) = TravelMode::parse(&req.mode) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("invalid mode: {}. Use walk, bike, or transit.", req.mode),
            }),
        )
            .into_response();
    };
    let profile = RoutingProfile::new(mode, req.sensitivity);
    let k = req.k.unwrap_or(state.engine.config().max_candidates);

    let graph = state.graph.current();
    let engine = state.engine.clone();
    let cancel = CancellationToken::new();
    // If the request future is dropped (client disconnect, timeout layer),
    // the guard cancels the token and the search aborts at its next
    // expansion step.
    let guard = cancel.clone().drop_guard();

    let result = tokio::task::spawn_blocking(move || {
        engine
            .find_routes(
                &graph,
                (req.src_lat, req.src_lon),
                (req.dst_lat, req.dst_lon),
                &profile,
                k,
                &cancel,
            )
            .map(|routes| {
                routes
                    .iter()
                    .map(|candidate| RouteDto::from_candidate(&graph, candidate))
                    .collect::<Vec<_>>()
            })
    })
    .await;
    drop(guard.disarm());

    match result {
        Ok(Ok(routes)) => Json(PathsResponse { routes }).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(join_err) => {
            tracing::error!(error = %join_err, "search task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".into(),
                }),
            )
                .into_response()
        }
    }
}

fn error_response(err: &RouteError) -> Response {
    let status = match err {
        RouteError::InvalidCoordinate { .. } => StatusCode::BAD_REQUEST,
        RouteError::NoRouteFound { .. } => StatusCode::NOT_FOUND,
        RouteError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        RouteError::UnknownEdge(_) | RouteError::StaleSnapshot { .. } => StatusCode::BAD_REQUEST,
        RouteError::GraphLoad(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

// ============ Health Endpoint ============

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub graph_version: String,
    pub nodes: usize,
    pub edges: usize,
    /// RFC 3339 timestamp of the last applied AQI snapshot, if any
    pub last_aqi_refresh: Option<String>,
}

/// Readiness signal: whether a graph is loaded and which version
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse),
    )
)]
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let graph = state.graph.current();
    let refresh = state.coordinator.status();
    Json(HealthResponse {
        status: "ok".into(),
        graph_version: graph.version().to_string(),
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        last_aqi_refresh: refresh.last_applied.map(|t| t.to_rfc3339()),
    })
}
