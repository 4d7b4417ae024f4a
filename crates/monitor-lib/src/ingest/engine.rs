//! The single task that owns all telemetry state
//!
//! Producers push readings through an [`IngestHandle`] without blocking.
//! The [`TelemetryEngine`] applies them one at a time: level check, offer
//! to every cadence tier, alert dispatch, then live publication.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::live::{LiveEvent, LiveFeed};
use super::store::TelemetryStore;
use crate::alert::{AlertDispatcher, Dispatch};
use crate::error::{Result, TelemetryError};
use crate::health::{Component, HealthRegistry};
use crate::models::{unix_now, AlertRecord, Category};
use crate::observability::{MonitorMetrics, StructuredLogger};
use crate::series::CategoryRegistry;

/// Default capacity of the ingestion queue
pub const DEFAULT_QUEUE_SIZE: usize = 1024;

/// Configuration for the telemetry engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Readings buffered between producers and the engine
    pub queue_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }
}

/// One scalar reading from a sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub category: Category,
    pub timestamp: f64,
    pub value: f64,
}

/// Non-blocking producer handle into the telemetry engine
#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<Reading>,
    configured: Arc<BTreeSet<Category>>,
    metrics: MonitorMetrics,
}

impl IngestHandle {
    /// Enqueue a reading without waiting
    ///
    /// Safe to call from any thread, including outside the runtime.
    pub fn offer_reading(&self, category: Category, timestamp: f64, value: f64) -> Result<()> {
        if !self.configured.contains(&category) {
            self.metrics.inc_readings_rejected("not_configured");
            return Err(TelemetryError::CategoryNotConfigured(category));
        }

        let reading = Reading {
            category,
            timestamp,
            value,
        };
        self.sender.try_send(reading).map_err(|e| match e {
            TrySendError::Full(_) => {
                self.metrics.inc_readings_rejected("queue_full");
                TelemetryError::IngestQueueFull
            }
            TrySendError::Closed(_) => {
                self.metrics.inc_readings_rejected("closed");
                TelemetryError::IngestClosed
            }
        })
    }

    /// Enqueue a reading for a category given by name
    pub fn offer_named(&self, category: &str, timestamp: f64, value: f64) -> Result<()> {
        self.offer_reading(category.parse()?, timestamp, value)
    }

    /// Enqueue a reading stamped with the current wall-clock time
    pub fn offer_now(&self, category: Category, value: f64) -> Result<()> {
        self.offer_reading(category, unix_now(), value)
    }

    pub fn is_configured(&self, category: Category) -> bool {
        self.configured.contains(&category)
    }
}

/// Owner of the category registry and driver of alerting
pub struct TelemetryEngine {
    receiver: mpsc::Receiver<Reading>,
    registry: Arc<RwLock<CategoryRegistry>>,
    dispatcher: Arc<AlertDispatcher>,
    feed: Arc<LiveFeed>,
    units: BTreeMap<Category, String>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    metrics: MonitorMetrics,
}

impl TelemetryEngine {
    pub fn new(
        registry: CategoryRegistry,
        dispatcher: Arc<AlertDispatcher>,
        feed: Arc<LiveFeed>,
        config: EngineConfig,
    ) -> (Self, IngestHandle, TelemetryStore) {
        let (sender, receiver) = mpsc::channel(config.queue_size.max(1));
        let metrics = MonitorMetrics::new();

        let configured: BTreeSet<Category> = registry.categories().collect();
        let units = configured
            .iter()
            .filter_map(|c| Some((*c, registry.unit(*c).ok()?.to_string())))
            .collect();
        let registry = Arc::new(RwLock::new(registry));

        let handle = IngestHandle {
            sender,
            configured: Arc::new(configured),
            metrics: metrics.clone(),
        };
        let store = TelemetryStore::new(registry.clone());

        let engine = Self {
            receiver,
            registry,
            dispatcher,
            feed,
            units,
            health: None,
            logger: None,
            metrics,
        };

        (engine, handle, store)
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Apply readings until shutdown or until every handle is dropped
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(categories = self.units.len(), "Starting telemetry engine");
        if let Some(health) = &self.health {
            health.set_healthy(Component::Ingest).await;
        }

        let mut processed = 0u64;
        loop {
            tokio::select! {
                next = self.receiver.recv() => {
                    match next {
                        Some(reading) => {
                            self.process(reading).await;
                            processed += 1;
                        }
                        None => {
                            info!("All ingest handles dropped");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down telemetry engine");
                    break;
                }
            }
        }

        debug!(processed, "Telemetry engine stopped");
        if let Some(health) = &self.health {
            health.set_unhealthy(Component::Ingest, "telemetry engine stopped").await;
        }
    }

    /// Apply one reading and return the alerts it raised
    ///
    /// Alerts are returned whether or not the dispatcher delivered them.
    pub async fn process(&self, reading: Reading) -> Vec<AlertRecord> {
        let Reading {
            category,
            timestamp,
            value,
        } = reading;

        if !timestamp.is_finite() || !value.is_finite() {
            self.metrics.inc_readings_rejected("non_finite");
            debug!(category = %category, timestamp, value, "Dropping non-finite reading");
            return Vec::new();
        }

        let start = Instant::now();
        let alerts = {
            let mut registry = self.registry.write().await;
            let level = registry.level_alert(category, timestamp, value);
            let rates = registry.offer(category, timestamp, value);
            match (level, rates) {
                (Ok(level), Ok(rates)) => level.into_iter().chain(rates).collect::<Vec<_>>(),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(category = %category, error = %e, "Reading for unconfigured category");
                    return Vec::new();
                }
            }
        };

        for alert in &alerts {
            self.metrics.inc_alerts_raised(category, alert);
            let outcome = self.dispatcher.dispatch(category, *alert);
            if let Some(logger) = &self.logger {
                logger.log_alert_raised(category, alert);
                if outcome.is_delivered() {
                    logger.log_alert_dispatched(category, alert);
                } else {
                    logger.log_alert_suppressed(category, alert, outcome.reason());
                }
            }
            self.record_dispatch_health(outcome).await;
        }

        let unit = self.units.get(&category).cloned().unwrap_or_default();
        self.feed.publish(&LiveEvent::LogValue {
            category,
            unit,
            timestamp,
            value,
        });

        self.metrics.inc_samples_ingested(category);
        self.metrics
            .observe_ingest_latency(start.elapsed().as_secs_f64());

        alerts
    }

    async fn record_dispatch_health(&self, outcome: Dispatch) {
        let Some(health) = &self.health else {
            return;
        };
        match outcome {
            Dispatch::Delivered => health.set_healthy(Component::Dispatcher).await,
            Dispatch::OutboxFull | Dispatch::OutboxClosed => {
                health
                    .set_degraded(
                        Component::Dispatcher,
                        format!("alert not delivered: {}", outcome.reason()),
                    )
                    .await
            }
            Dispatch::CoolingDown => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{ManualClock, Notification};
    use crate::config::{CategoryConfig, SeriesConfig, TelemetryConfig};
    use crate::models::{Comparator, SampleRecord};
    use std::time::Duration;

    struct Harness {
        engine: TelemetryEngine,
        handle: IngestHandle,
        store: TelemetryStore,
        feed: Arc<LiveFeed>,
        outbox: mpsc::Receiver<Notification>,
        clock: Arc<ManualClock>,
    }

    fn config() -> TelemetryConfig {
        let depth = CategoryConfig {
            unit: "litres".to_string(),
            level_low: Some(10000.0),
            level_high: None,
            rate_comparator: Comparator::LessThan,
            series: vec![
                SeriesConfig::new(10, 16, Some(-2.0)),
                SeriesConfig::new(60, 16, None),
            ],
        };
        let density = CategoryConfig {
            unit: "density".to_string(),
            level_low: None,
            level_high: Some(1.005),
            rate_comparator: Comparator::GreaterThan,
            series: vec![SeriesConfig::new(60, 16, Some(0.02))],
        };

        TelemetryConfig {
            categories: BTreeMap::from([(Category::Depth, depth), (Category::Density, density)]),
            ..TelemetryConfig::default()
        }
    }

    fn harness() -> Harness {
        let config = config();
        let registry = CategoryRegistry::from_config(&config).unwrap();
        let clock = Arc::new(ManualClock::new(0.0));
        let (dispatcher, outbox) = AlertDispatcher::channel(&config.alerts);
        let dispatcher = Arc::new(dispatcher.with_clock(clock.clone()));
        let feed = Arc::new(LiveFeed::new(16));
        let (engine, handle, store) =
            TelemetryEngine::new(registry, dispatcher, feed.clone(), EngineConfig::default());

        Harness {
            engine,
            handle,
            store,
            feed,
            outbox,
            clock,
        }
    }

    fn reading(category: Category, timestamp: f64, value: f64) -> Reading {
        Reading {
            category,
            timestamp,
            value,
        }
    }

    #[tokio::test]
    async fn test_process_records_history_per_cadence() {
        let h = harness();
        for (ts, value) in [(0.0, 12000.0), (30.0, 11990.0), (65.0, 11980.0)] {
            h.engine.process(reading(Category::Depth, ts, value)).await;
        }

        let fast = h.store.history(Category::Depth, Duration::from_secs(10)).await.unwrap();
        let slow = h.store.history(Category::Depth, Duration::from_secs(60)).await.unwrap();
        assert_eq!(fast.len(), 3);
        assert_eq!(
            slow,
            vec![SampleRecord::new(0.0, 12000.0), SampleRecord::new(65.0, 11980.0)]
        );
    }

    #[tokio::test]
    async fn test_level_alert_is_dispatched() {
        let mut h = harness();
        let alerts = h.engine.process(reading(Category::Depth, 100.0, 9500.0)).await;
        assert_eq!(alerts, vec![AlertRecord::level(&SampleRecord::new(100.0, 9500.0))]);

        let notification = h.outbox.try_recv().unwrap();
        assert_eq!(notification.category, Category::Depth);
        assert_eq!(notification.alert.delta, None);
    }

    #[tokio::test]
    async fn test_closed_outbox_degrades_dispatcher_health() {
        let h = harness();
        let health = HealthRegistry::new();
        health.register(Component::Dispatcher).await;
        let engine = h.engine.with_health(health.clone());
        drop(h.outbox);

        engine.process(reading(Category::Depth, 100.0, 9500.0)).await;
        assert_eq!(
            health.status(Component::Dispatcher).await,
            Some(crate::health::ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_delivery_keeps_dispatcher_healthy() {
        let h = harness();
        let health = HealthRegistry::new();
        health.set_degraded(Component::Dispatcher, "outbox full").await;
        let engine = h.engine.with_health(health.clone());

        engine.process(reading(Category::Depth, 100.0, 9500.0)).await;
        assert_eq!(
            health.status(Component::Dispatcher).await,
            Some(crate::health::ComponentStatus::Healthy)
        );
        // Suppressed by the cooldown: health is left as it was
        h.clock.advance(1.0);
        engine.process(reading(Category::Depth, 200.0, 9400.0)).await;
        assert_eq!(
            health.status(Component::Dispatcher).await,
            Some(crate::health::ComponentStatus::Healthy)
        );
    }

    #[tokio::test]
    async fn test_rate_alert_on_fast_tier_only() {
        let h = harness();
        h.engine.process(reading(Category::Depth, 0.0, 50_000.0)).await;
        let alerts = h.engine.process(reading(Category::Depth, 60.0, 49_992.0)).await;

        // The 60s tier rejects the second sample
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].delta, Some(-8.0));
    }

    #[tokio::test]
    async fn test_cooldown_spans_categories() {
        let mut h = harness();
        h.clock.set(1_000.0);
        h.engine.process(reading(Category::Depth, 1_000.0, 9500.0)).await;
        h.clock.advance(60.0);
        let alerts = h.engine.process(reading(Category::Density, 1_060.0, 1.01)).await;

        assert_eq!(alerts.len(), 1);
        assert_eq!(h.outbox.try_recv().unwrap().category, Category::Depth);
        assert!(h.outbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_every_ingested_sample_is_published() {
        let h = harness();
        let mut sub = h.feed.subscribe();

        h.engine.process(reading(Category::Depth, 0.0, 12000.0)).await;
        // Rejected by every tier but still an ingested sample
        h.engine.process(reading(Category::Depth, 1.0, 12000.0)).await;

        let first = sub.receiver.try_recv().unwrap();
        assert_eq!(
            first,
            LiveEvent::LogValue {
                category: Category::Depth,
                unit: "litres".to_string(),
                timestamp: 0.0,
                value: 12000.0,
            }
        );
        assert!(sub.receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_non_finite_reading_is_dropped() {
        let h = harness();
        let mut sub = h.feed.subscribe();
        assert!(h.engine.process(reading(Category::Depth, 0.0, f64::NAN)).await.is_empty());
        assert!(h.engine.process(reading(Category::Depth, f64::INFINITY, 1.0)).await.is_empty());

        assert!(sub.receiver.try_recv().is_err());
        assert!(h.store.history(Category::Depth, Duration::from_secs(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_handle_rejects_unconfigured_category() {
        let h = harness();
        assert_eq!(
            h.handle.offer_reading(Category::WaterTemp, 0.0, 20.0),
            Err(TelemetryError::CategoryNotConfigured(Category::WaterTemp))
        );
        assert_eq!(
            h.handle.offer_named("pressure", 0.0, 1.0),
            Err(TelemetryError::UnknownCategory("pressure".to_string()))
        );
        assert!(h.handle.is_configured(Category::Depth));
    }

    #[tokio::test]
    async fn test_handle_reports_full_and_closed_queue() {
        let config = config();
        let registry = CategoryRegistry::from_config(&config).unwrap();
        let (dispatcher, _outbox) = AlertDispatcher::channel(&config.alerts);
        let (engine, handle, _store) = TelemetryEngine::new(
            registry,
            Arc::new(dispatcher),
            Arc::new(LiveFeed::default()),
            EngineConfig { queue_size: 1 },
        );

        handle.offer_reading(Category::Depth, 0.0, 1.0).unwrap();
        assert_eq!(
            handle.offer_reading(Category::Depth, 1.0, 1.0),
            Err(TelemetryError::IngestQueueFull)
        );

        drop(engine);
        assert_eq!(
            handle.offer_reading(Category::Depth, 2.0, 1.0),
            Err(TelemetryError::IngestClosed)
        );
    }

    #[tokio::test]
    async fn test_run_applies_readings_from_other_threads() {
        let h = harness();
        let health = HealthRegistry::new();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let engine = h.engine.with_health(health.clone());
        let task = tokio::spawn(engine.run(shutdown_rx));

        let handle = h.handle.clone();
        std::thread::spawn(move || {
            for i in 0..5 {
                handle
                    .offer_reading(Category::Depth, i as f64 * 11.0, 12000.0)
                    .unwrap();
            }
        })
        .join()
        .unwrap();

        let store = h.store.clone();
        let applied = tokio::time::timeout(Duration::from_secs(2), async move {
            loop {
                let history = store.history(Category::Depth, Duration::from_secs(10)).await.unwrap();
                if history.len() == 5 {
                    break history;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(applied.len(), 5);

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(
            health.status(Component::Ingest).await,
            Some(crate::health::ComponentStatus::Unhealthy)
        );
    }
}
