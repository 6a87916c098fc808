//! Main Entrypoint for the Chat Relay Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Constructing the Axum router and applying middleware.
//! 3. Starting the relay and handling graceful shutdown.

use anyhow::Context;
use chatrelay_server::{
    config::Config,
    router::{create_router, serve},
    state::AppState,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal and cancels the relay's shutdown token.
async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    // --- 3. Create Router and Apply Middleware ---
    let shutdown = CancellationToken::new();
    let app_state = Arc::new(AppState::new(shutdown.clone()));
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(app_state.clone()).layer(cors);

    // --- 4. Start Server ---
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tokio::spawn(shutdown_signal(shutdown));

    serve(listener, app, app_state).await
}
