//! Tank Monitor - telemetry buffering and alerting daemon
//!
//! Reads the tank range finder, keeps bounded multi-cadence histories of
//! every sensor category, raises rate-limited alerts and serves history
//! downloads and a live event stream over HTTP.

use anyhow::{Context, Result};
use monitor_lib::{
    alert::{AlertDispatcher, AlertNotifier, LogNotifier, NotificationWorker, WebhookNotifier},
    health::{Component, HealthRegistry},
    ingest::{EngineConfig, LiveFeed, TelemetryEngine},
    observability::{MonitorMetrics, StructuredLogger},
    series::CategoryRegistry,
    source::{RangeFinderReader, SourceLoop},
    Category,
};
use std::sync::Arc;
use tankmonitor::{api, config::MonitorConfig};
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const MONITOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting tankmonitor");

    // Load configuration; invalid settings abort startup
    let config = MonitorConfig::load()?;
    info!(site = %config.site_name, port = config.listen_port, "Monitor configured");

    // Initialize health registry
    let health_registry = HealthRegistry::new();
    health_registry.register(Component::Ingest).await;
    health_registry.register(Component::Dispatcher).await;
    health_registry.register(Component::Notifier).await;
    if config.range_finder.is_some() {
        health_registry.register(Component::Source).await;
    }

    let metrics = MonitorMetrics::new();
    let logger = StructuredLogger::new(&config.site_name);

    // Telemetry core
    let registry = CategoryRegistry::from_config(&config.telemetry)?;
    let categories: Vec<Category> = registry.categories().collect();
    let (dispatcher, outbox) = AlertDispatcher::channel(&config.telemetry.alerts);
    let feed = Arc::new(LiveFeed::new(config.live_buffer).with_logger(logger.clone()));
    let (engine, ingest, store) = TelemetryEngine::new(
        registry,
        Arc::new(dispatcher),
        feed.clone(),
        EngineConfig {
            queue_size: config.ingest_queue_size,
        },
    );
    let engine = engine
        .with_health(health_registry.clone())
        .with_logger(logger.clone());

    let worker = NotificationWorker::new(outbox, build_notifiers(&config)?, config.telemetry.units())
        .with_health(health_registry.clone())
        .with_logger(logger.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let engine_handle = tokio::spawn(engine.run(shutdown_tx.subscribe()));
    let worker_handle = tokio::spawn(worker.run(shutdown_tx.subscribe()));

    let source_handle = match &config.range_finder {
        Some(range_finder) => {
            let device = tokio::fs::File::open(&range_finder.device)
                .await
                .with_context(|| format!("Failed to open range finder {}", range_finder.device.display()))?;
            let source = SourceLoop::new(
                Box::new(RangeFinderReader::new(device)),
                ingest.clone(),
                range_finder.calibration,
            )
            .with_health(health_registry.clone())
            .with_logger(logger.clone());
            Some(tokio::spawn(source.run(shutdown_tx.subscribe())))
        }
        None => {
            info!("No range finder configured; readings arrive from other producers only");
            None
        }
    };

    logger.log_startup(MONITOR_VERSION, &categories);

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        store,
        feed,
        metrics,
    ));

    // Mark monitor as ready after initialization
    health_registry.set_ready(true).await;

    // Start HTTP API
    let api_handle = tokio::spawn(api::serve(config.listen_port, app_state));

    // Wait for shutdown signal or API failure
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            let reason = match result {
                Ok(Ok(())) => "API server exited".to_string(),
                Ok(Err(e)) => format!("API server failed: {e:#}"),
                Err(e) => format!("API server task panicked: {e}"),
            };
            error!(reason = %reason, "Stopping monitor");
            logger.log_shutdown(&reason);
        }
    }

    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());
    drop(ingest);

    let _ = engine_handle.await;
    let _ = worker_handle.await;
    if let Some(handle) = source_handle {
        let _ = handle.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Log every alert, and post it to the webhook when one is configured
fn build_notifiers(config: &MonitorConfig) -> Result<Vec<Arc<dyn AlertNotifier>>> {
    let mut notifiers: Vec<Arc<dyn AlertNotifier>> = vec![Arc::new(LogNotifier::new(&config.site_name))];

    if let Some(url) = &config.webhook_url {
        info!(url = %url, "Alert webhook enabled");
        notifiers.push(Arc::new(WebhookNotifier::new(url.as_str(), config.site_name.as_str())?));
    }

    Ok(notifiers)
}
