//! Command-line entrypoint for a single relay participant.

use anyhow::Context;
use chatrelay_client::{config::Config, create_client};
use clap::Parser;
use tracing::info;

/// Connect to the chat relay as the human user or as the bot.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Participant role: `user` or `bot`.
    #[arg(default_value = "user")]
    role: String,

    /// Relay WebSocket URI; overrides RELAY_URI.
    #[arg(long)]
    uri: Option<String>,

    /// Run the bot without a model; overrides OFFLINE.
    #[arg(long)]
    offline: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(uri) = args.uri {
        config.relay_uri = uri;
    }
    config.offline |= args.offline;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let client = create_client(&args.role, &config)?;
    info!(role = %client.role(), "Client created");
    client.connect(&config.relay_uri).await
}
