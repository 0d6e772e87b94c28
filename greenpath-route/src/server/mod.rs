//! HTTP query server for the routing engine.

pub mod api;
pub mod state;

use std::sync::Arc;

use anyhow::Result;

pub use state::AppState;

/// Bind and serve until the process is stopped.
pub async fn run_server(state: AppState, port: u16) -> Result<()> {
    let app = api::build_router(Arc::new(state));
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "query server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
