//! Chroma vector store for Synaptic
//!
//! Serves on http://localhost:8000 by default; see `LauncherConfig` for
//! the environment overrides.

use anyhow::Result;

use synaptic_pdf::config::LauncherConfig;
use synaptic_pdf::{launcher, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = LauncherConfig::from_env();
    telemetry::init(&format!("synaptic_pdf={}", config.log_level));

    tracing::info!(
        data_dir = %config.data_dir.display(),
        host = %config.host,
        port = config.port,
        "Starting Chroma launcher"
    );

    launcher::run(config).await
}
