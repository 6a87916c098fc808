//! Local chat session launcher.
//!
//! Starts the relay in-process, connects the bot to it in the background, and
//! runs the interactive user client in the foreground. When the user leaves,
//! the relay shuts down and takes the bot with it.

use anyhow::Context;
use chatrelay_client::{config::Config as ClientConfig, create_client};
use chatrelay_server::{
    config::Config as RelayConfig,
    router::{create_router, serve},
    state::AppState,
};
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long the user client waits for the bot to join before starting alone.
const BOT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let relay_config = RelayConfig::from_env().context("Failed to load relay configuration")?;
    let client_config = ClientConfig::from_env().context("Failed to load client configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(client_config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    // Build both clients first so a bad configuration fails before anything binds.
    let bot = create_client("bot", &client_config)?;
    let user = create_client("user", &client_config)?;

    let shutdown = CancellationToken::new();
    let app_state = Arc::new(AppState::new(shutdown.clone()));
    let listener = tokio::net::TcpListener::bind(relay_config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", relay_config.bind_address))?;
    let uri = format!("ws://{}/ws", listener.local_addr()?);
    let server = tokio::spawn(serve(
        listener,
        create_router(app_state.clone()),
        app_state.clone(),
    ));

    let bot_task = tokio::spawn(bot.connect(uri.clone()));
    // Lines typed before the bot registers would reach nobody.
    match tokio::time::timeout(BOT_JOIN_TIMEOUT, app_state.registry.wait_for_len(1)).await {
        Ok(()) => info!(%uri, "Relay and bot started"),
        Err(_) => warn!(%uri, "Bot has not joined the relay; starting without it"),
    }

    let result = user.connect(&uri).await;

    shutdown.cancel();
    match bot_task.await {
        Ok(Err(e)) => error!(error = ?e, "Bot client failed"),
        Err(e) => error!(error = ?e, "Bot task panicked"),
        Ok(Ok(())) => {}
    }
    server.await??;
    result
}
