//! Geocoding gateway binary.
//!
//! Loads configuration from `CONFIG_PATH`, `config.yaml` or
//! `config/default.yaml`, then serves HTTP until Ctrl-C or SIGTERM.

use anyhow::Context;
use geocode_config::{load_config, LogFormat as ConfigLogFormat};
use geocode_server::{AppState, Server};
use geocode_telemetry::{init_logging, LogFormat, LoggingConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().await.context("failed to load configuration")?;

    let format = match config.logging.format {
        ConfigLogFormat::Json => LogFormat::Json,
        ConfigLogFormat::Pretty => LogFormat::Pretty,
        ConfigLogFormat::Compact => LogFormat::Compact,
    };
    init_logging(
        &LoggingConfig::new()
            .with_level(config.logging.level.clone())
            .with_format(format),
    )
    .context("failed to initialise logging")?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting geocoding gateway");

    let state = AppState::from_config(&config).context("failed to build gateway")?;
    Server::new(config.server.clone(), state)
        .run()
        .await
        .context("server failed")?;
    Ok(())
}
