//! Axum Router Configuration
//!
//! This module defines the HTTP routing for the relay: the WebSocket endpoint,
//! the status route, and the OpenAPI document describing them.

use crate::{handlers, models::RelayStatus, state::AppState, ws::ws_handler};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::{path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(handlers::get_status),
    components(schemas(RelayStatus)),
    tags(
        (name = "Chat Relay", description = "Broadcast relay between a human and an agent")
    )
)]
pub struct ApiDoc;

/// Writes the relay's OpenAPI document as pretty-printed JSON to `path`.
pub fn write_openapi(path: &Path) -> Result<()> {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("Failed to render OpenAPI document")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/status", get(handlers::get_status))
        .with_state(app_state)
}

/// Serves `app` on `listener` until the state's shutdown token is cancelled.
pub async fn serve(listener: TcpListener, app: Router, app_state: Arc<AppState>) -> Result<()> {
    let shutdown = app_state.shutdown.clone();
    info!(address = %listener.local_addr()?, "Relay listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    info!("Relay has shut down.");
    Ok(())
}
