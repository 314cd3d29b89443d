//! # Telemetry Bridge
//!
//! Command-line entry point.
//!
//! Provides:
//! - configuration loading and validation
//! - pipeline wiring (MQTT -> ordered queue -> resource API)
//! - graceful shutdown that drains queued events

mod cli;
mod run;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::info;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: cli.metrics_port,
        default_log_level: cli.default_log_level().to_string(),
    })?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Telemetry bridge starting"
    );

    let result = run::run_bridge(&cli).await;

    if let Err(ref e) = result {
        tracing::error!(error = %e, "Telemetry bridge failed");
    }

    result
}
