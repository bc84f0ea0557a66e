//! # Chat Relay
//!
//! Entry point: initializes logging, loads configuration, builds the relay
//! and serves until Ctrl-C or SIGTERM.

use anyhow::Result;
use tracing::info;

use chat_relay::config::Settings;
use chat_relay::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for structured logging
    chat_relay::telemetry::init_tracing();

    info!("Starting Chat Relay...");

    // Load configuration from environment and config files
    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        rpc_port = %settings.rpc.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Chat Relay stopped");
    Ok(())
}
