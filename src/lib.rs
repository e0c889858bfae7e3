pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod plan;
pub mod providers;
pub mod server;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{error, info};

use config::Config;
use server::AppState;

/// Loads configuration, fails fast on any invalid value, then serves until shutdown.
pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cfg = Config::from_env()
        .inspect_err(|err| error!(error = %err, "invalid configuration; refusing to start"))
        .context("Invalid configuration")?;
    info!(
        environment = %cfg.environment,
        port = cfg.port,
        mode = cfg.mode.as_str(),
        upstream = %cfg.upstream.display_url(),
        upstream_name = %cfg.upstream.name,
        timeout_ms = cfg.upstream.timeout.as_millis() as u64,
        "loaded runtime configuration"
    );

    let client = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;

    server::serve(AppState::new(cfg, client)).await
}
