//! Observability infrastructure for the tank monitor
//!
//! Provides:
//! - Prometheus metrics (ingestion, alerting, live feed, sources)
//! - Structured logging of significant events with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::models::{AlertRecord, Category};

/// Histogram buckets for ingestion latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    samples_ingested: IntCounterVec,
    readings_rejected: IntCounterVec,
    alerts_raised: IntCounterVec,
    alerts_delivered: IntCounter,
    alerts_suppressed: IntCounter,
    notification_failures: IntCounterVec,
    live_subscribers: IntGauge,
    live_listeners_pruned: IntCounter,
    ingest_latency_seconds: Histogram,
    source_errors: IntCounter,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            samples_ingested: register_int_counter_vec!(
                "tankmonitor_samples_ingested_total",
                "Readings processed by the telemetry engine",
                &["category"]
            )
            .expect("Failed to register samples_ingested"),

            readings_rejected: register_int_counter_vec!(
                "tankmonitor_readings_rejected_total",
                "Readings refused before reaching the telemetry engine",
                &["reason"]
            )
            .expect("Failed to register readings_rejected"),

            alerts_raised: register_int_counter_vec!(
                "tankmonitor_alerts_raised_total",
                "Level and rate alerts raised by the telemetry engine",
                &["category", "kind"]
            )
            .expect("Failed to register alerts_raised"),

            alerts_delivered: register_int_counter!(
                "tankmonitor_alerts_delivered_total",
                "Alerts handed to the notification outbox"
            )
            .expect("Failed to register alerts_delivered"),

            alerts_suppressed: register_int_counter!(
                "tankmonitor_alerts_suppressed_total",
                "Alerts suppressed by the global cooldown or a full outbox"
            )
            .expect("Failed to register alerts_suppressed"),

            notification_failures: register_int_counter_vec!(
                "tankmonitor_notification_failures_total",
                "Failed alert deliveries per notifier",
                &["notifier"]
            )
            .expect("Failed to register notification_failures"),

            live_subscribers: register_int_gauge!(
                "tankmonitor_live_subscribers",
                "Currently connected live-update listeners"
            )
            .expect("Failed to register live_subscribers"),

            live_listeners_pruned: register_int_counter!(
                "tankmonitor_live_listeners_pruned_total",
                "Live-update listeners removed after a failed delivery"
            )
            .expect("Failed to register live_listeners_pruned"),

            ingest_latency_seconds: register_histogram!(
                "tankmonitor_ingest_latency_seconds",
                "Time spent processing one reading",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register ingest_latency_seconds"),

            source_errors: register_int_counter!(
                "tankmonitor_source_errors_total",
                "Malformed or unreadable sensor frames"
            )
            .expect("Failed to register source_errors"),
        }
    }
}

/// Lightweight handle to the process-wide Prometheus metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn inc_samples_ingested(&self, category: Category) {
        self.inner()
            .samples_ingested
            .with_label_values(&[category.as_str()])
            .inc();
    }

    pub fn inc_readings_rejected(&self, reason: &str) {
        self.inner()
            .readings_rejected
            .with_label_values(&[reason])
            .inc();
    }

    pub fn inc_alerts_raised(&self, category: Category, alert: &AlertRecord) {
        self.inner()
            .alerts_raised
            .with_label_values(&[category.as_str(), &alert.kind().to_string()])
            .inc();
    }

    pub fn inc_alerts_delivered(&self) {
        self.inner().alerts_delivered.inc();
    }

    pub fn inc_alerts_suppressed(&self) {
        self.inner().alerts_suppressed.inc();
    }

    pub fn inc_notification_failures(&self, notifier: &str) {
        self.inner()
            .notification_failures
            .with_label_values(&[notifier])
            .inc();
    }

    pub fn set_live_subscribers(&self, count: i64) {
        self.inner().live_subscribers.set(count);
    }

    pub fn inc_live_listeners_pruned(&self) {
        self.inner().live_listeners_pruned.inc();
    }

    pub fn observe_ingest_latency(&self, duration_secs: f64) {
        self.inner().ingest_latency_seconds.observe(duration_secs);
    }

    pub fn inc_source_errors(&self) {
        self.inner().source_errors.inc();
    }
}

/// Structured logger for monitor events
#[derive(Clone)]
pub struct StructuredLogger {
    site: String,
}

impl StructuredLogger {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn log_startup(&self, version: &str, categories: &[Category]) {
        let categories: Vec<&str> = categories.iter().map(Category::as_str).collect();
        info!(
            event = "monitor_started",
            site = %self.site,
            version = %version,
            categories = ?categories,
            "Tank monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            site = %self.site,
            reason = %reason,
            "Tank monitor shutting down"
        );
    }

    pub fn log_alert_raised(&self, category: Category, alert: &AlertRecord) {
        info!(
            event = "alert_raised",
            site = %self.site,
            category = %category,
            kind = %alert.kind(),
            timestamp = alert.timestamp,
            value = alert.value,
            delta = ?alert.delta,
            "Alert condition detected"
        );
    }

    pub fn log_alert_dispatched(&self, category: Category, alert: &AlertRecord) {
        warn!(
            event = "alert_dispatched",
            site = %self.site,
            category = %category,
            kind = %alert.kind(),
            value = alert.value,
            delta = ?alert.delta,
            "Sending alert notification"
        );
    }

    pub fn log_alert_suppressed(&self, category: Category, alert: &AlertRecord, reason: &str) {
        debug!(
            event = "alert_suppressed",
            site = %self.site,
            category = %category,
            kind = %alert.kind(),
            reason = %reason,
            "Alert notification suppressed"
        );
    }

    pub fn log_notification_failed(&self, notifier: &str, category: Category, error: &str) {
        warn!(
            event = "notification_failed",
            site = %self.site,
            notifier = %notifier,
            category = %category,
            error = %error,
            "Alert notification delivery failed"
        );
    }

    pub fn log_listener_pruned(&self, listener_id: u64, reason: &str) {
        info!(
            event = "listener_pruned",
            site = %self.site,
            listener_id = listener_id,
            reason = %reason,
            "Removed live-update listener"
        );
    }

    pub fn log_source_error(&self, source: &str, error: &str) {
        warn!(
            event = "source_error",
            site = %self.site,
            source = %source,
            error = %error,
            "Unable to convert sensor frame"
        );
    }
}
