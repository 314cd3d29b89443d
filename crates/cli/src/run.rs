//! Daemon lifecycle: load config, wire the pipeline, run until a signal.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use classifier::FieldClassifier;
use config_loader::ConfigLoader;
use contracts::CollectorConfig;
use hypermedia::HttpHypermediaClient;
use ingestion::{IngestionCoordinator, IngestionError, MessageIngestor};
use task_queue::OrderedTaskQueue;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cli::Cli;

/// Queue name used in logs and metrics
const EVENT_QUEUE: &str = "events";

/// Load and validate the configuration file
pub fn load_config(path: &Path) -> Result<CollectorConfig> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }
    ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Run the bridge until Ctrl+C / SIGTERM
///
/// On shutdown the ingestor stops first, then every already queued event is
/// processed before returning.
pub async fn run_bridge(args: &Cli) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let config = load_config(&args.config)?;

    info!(
        resource_api = %config.resource_api.url,
        broker = %config.transport.broker_url,
        topic = %config.transport.topic,
        "Configuration loaded"
    );

    if args.check {
        info!("Check mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let client = HttpHypermediaClient::new(&config.resource_api)
        .context("Failed to build resource API client")?;
    let classifier = FieldClassifier::standard().context("Failed to compile field tables")?;
    let coordinator = IngestionCoordinator::new(client, classifier, &config.resource_api);

    let queue = OrderedTaskQueue::builder(EVENT_QUEUE, coordinator)
        .on_error(|e: &IngestionError| warn!(error = %e, "Event dropped"))
        .spawn();

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping ingestion...");
        signal_token.cancel();
    });

    let ingestor = MessageIngestor::new(config.transport.clone());
    let result = ingestor.run(&queue, shutdown).await;

    let metrics = Arc::clone(queue.metrics());
    info!(pending = metrics.pending(), "Draining event queue");
    queue.shutdown().await;

    let stats = metrics.snapshot();
    info!(
        pushed = stats.pushed,
        completed = stats.completed,
        failed = stats.failed,
        "Telemetry bridge finished"
    );

    result.context("MQTT ingestion failed")
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for check mode
fn print_config_summary(config: &CollectorConfig) {
    let relations = &config.resource_api.relations;
    println!("\n=== Configuration Summary ===\n");
    println!("Resource API:");
    println!("  URL: {}", config.resource_api.url);
    println!("  Timeout: {}s", config.resource_api.timeout_secs);
    println!(
        "  Relations: {} -> {} -> {}",
        relations.devices, relations.sensors, relations.data_history
    );
    println!("\nTransport:");
    println!("  Broker: {}", config.transport.broker_url);
    println!("  Client ID: {}", config.transport.client_id);
    println!("  Topic: {} (QoS {})", config.transport.topic, config.transport.qos);
    println!("  Keep-alive: {}s", config.transport.keep_alive_secs);
    println!();
}
