//! Loop feeding a reading source into the telemetry engine

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{Calibration, RawReading, ReadingSource};
use crate::error::TelemetryError;
use crate::health::{Component, ComponentStatus, HealthRegistry};
use crate::ingest::IngestHandle;
use crate::models::{unix_now, Category};
use crate::observability::{MonitorMetrics, StructuredLogger};

/// Drives one [`ReadingSource`] until it is exhausted or shutdown is signalled
pub struct SourceLoop {
    source: Box<dyn ReadingSource>,
    ingest: IngestHandle,
    calibration: Calibration,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    metrics: MonitorMetrics,
}

impl SourceLoop {
    pub fn new(source: Box<dyn ReadingSource>, ingest: IngestHandle, calibration: Calibration) -> Self {
        info!(
            m = calibration.m,
            b = calibration.b,
            "Calibrating range finder"
        );
        Self {
            source,
            ingest,
            calibration,
            health: None,
            logger: None,
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(source = self.source.name(), "Starting reading source");

        loop {
            tokio::select! {
                next = self.source.next_reading() => {
                    match next {
                        Ok(Some(raw)) => {
                            self.ingest(raw, unix_now());
                            if let Some(health) = &self.health {
                                if health.status(Component::Source).await != Some(ComponentStatus::Healthy) {
                                    health.set_healthy(Component::Source).await;
                                }
                            }
                        }
                        Ok(None) => {
                            warn!(source = self.source.name(), "Reading source closed");
                            if let Some(health) = &self.health {
                                health.set_unhealthy(Component::Source, "reading source closed").await;
                            }
                            break;
                        }
                        Err(e) => {
                            let error = format!("{e:#}");
                            self.metrics.inc_source_errors();
                            match &self.logger {
                                Some(logger) => logger.log_source_error(self.source.name(), &error),
                                None => warn!(source = self.source.name(), error = %error, "Unable to read frame"),
                            }
                            if let Some(health) = &self.health {
                                health.set_degraded(Component::Source, error).await;
                            }
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!(source = self.source.name(), "Shutting down reading source");
                    break;
                }
            }
        }
    }

    /// Offer the raw distance and the calibrated depth for one frame
    fn ingest(&self, raw: RawReading, timestamp: f64) {
        let readings = [
            (Category::Distance, raw.millimetres),
            (Category::Depth, self.calibration.apply(raw.millimetres)),
        ];

        for (category, value) in readings {
            match self.ingest.offer_reading(category, timestamp, value) {
                Ok(()) => {}
                Err(TelemetryError::CategoryNotConfigured(_)) => {
                    debug!(category = %category, "Category not configured, skipping");
                }
                Err(e) => {
                    warn!(category = %category, error = %e, "Failed to enqueue reading");
                }
            }
        }
    }
}
