//! # Direct Messaging Server
//!
//! Entry point: tracing, configuration, then the HTTP/websocket server.

use anyhow::Result;
use tracing::info;

use dm_server::config::Settings;
use dm_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    dm_server::telemetry::init_tracing();

    info!("Starting DM server...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
