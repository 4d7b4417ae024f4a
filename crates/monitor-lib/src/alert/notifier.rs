//! Alert notification sinks
//!
//! Handles:
//! - Rendering alerts into human-readable text
//! - Logging alerts and posting them to an Alertmanager-compatible webhook
//! - Draining the notification outbox on a dedicated task

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use super::Notification;
use crate::export::to_datetime;
use crate::health::{Component, HealthRegistry};
use crate::models::{AlertKind, AlertRecord, Category};
use crate::observability::{MonitorMetrics, StructuredLogger};

/// Default timeout for webhook requests
const WEBHOOK_TIMEOUT_SECS: u64 = 10;

/// A rendered alert ready to hand to a notifier
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub category: Category,
    pub unit: String,
    pub alert: AlertRecord,
    pub summary: String,
    pub description: String,
}

impl AlertMessage {
    pub fn render(category: Category, unit: &str, alert: &AlertRecord) -> Self {
        let (summary, description) = match alert.delta {
            None => (
                format!("Tank level alert: {category} at {:.2} {unit}", alert.value),
                format!(
                    "The {category} reading of {:.2} {unit} is outside its configured bounds.",
                    alert.value
                ),
            ),
            Some(delta) => (
                format!("Rate alert: {category} changing at {delta:.2} {unit}/min"),
                format!(
                    "The {category} reading is changing at {delta:.2} {unit}/min. Current reading: {:.2} {unit}.",
                    alert.value
                ),
            ),
        };

        Self {
            category,
            unit: unit.to_string(),
            alert: *alert,
            summary,
            description,
        }
    }

    pub fn kind(&self) -> AlertKind {
        self.alert.kind()
    }

    /// RFC3339 time of the alerting reading
    pub fn starts_at(&self) -> String {
        to_datetime(self.alert.timestamp)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.alert.timestamp.to_string())
    }
}

/// An external alert sink
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// Short identifier used in logs and metrics
    fn name(&self) -> &str;

    async fn notify(&self, message: &AlertMessage) -> Result<()>;
}

/// Writes alerts to the log
#[derive(Debug, Clone)]
pub struct LogNotifier {
    site: String,
}

impl LogNotifier {
    pub fn new(site: impl Into<String>) -> Self {
        Self { site: site.into() }
    }
}

#[async_trait]
impl AlertNotifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, message: &AlertMessage) -> Result<()> {
        warn!(
            event = "alert_notification",
            site = %self.site,
            category = %message.category,
            kind = %message.kind(),
            value = message.alert.value,
            delta = ?message.alert.delta,
            summary = %message.summary,
            "{}",
            message.description
        );
        Ok(())
    }
}

/// Alertmanager webhook alert format
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertmanagerAlert {
    /// Alert status (firing or resolved)
    pub status: String,
    /// Alert labels for routing and grouping
    pub labels: HashMap<String, String>,
    /// Alert annotations with details
    pub annotations: HashMap<String, String>,
    /// Start time in RFC3339 format
    pub starts_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
}

/// Alertmanager webhook payload (array of alerts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertmanagerPayload {
    pub alerts: Vec<AlertmanagerAlert>,
}

impl AlertmanagerAlert {
    pub fn from_message(message: &AlertMessage, site: &str) -> Self {
        let alertname = match message.kind() {
            AlertKind::Level => "TankLevelAlert",
            AlertKind::Rate => "TankRateOfChangeAlert",
        };

        let mut labels = HashMap::new();
        labels.insert("alertname".to_string(), alertname.to_string());
        labels.insert("severity".to_string(), "warning".to_string());
        labels.insert("category".to_string(), message.category.to_string());
        labels.insert("site".to_string(), site.to_string());

        let mut annotations = HashMap::new();
        annotations.insert("summary".to_string(), message.summary.clone());
        annotations.insert("description".to_string(), message.description.clone());
        annotations.insert("value".to_string(), format!("{:.2}", message.alert.value));
        annotations.insert("unit".to_string(), message.unit.clone());
        if let Some(delta) = message.alert.delta {
            annotations.insert("rate_per_minute".to_string(), format!("{delta:.2}"));
        }

        Self {
            status: "firing".to_string(),
            labels,
            annotations,
            starts_at: message.starts_at(),
            ends_at: None,
            generator_url: None,
        }
    }
}

/// Posts alerts to an Alertmanager-compatible webhook
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    site: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, site: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
            .build()
            .context("Failed to build webhook HTTP client")?;

        Ok(Self {
            url: url.into(),
            site: site.into(),
            client,
        })
    }

    pub fn payload(&self, message: &AlertMessage) -> AlertmanagerPayload {
        AlertmanagerPayload {
            alerts: vec![AlertmanagerAlert::from_message(message, &self.site)],
        }
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn notify(&self, message: &AlertMessage) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(message))
            .send()
            .await
            .with_context(|| format!("Failed to reach webhook {}", self.url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Webhook {} returned {}", self.url, status);
        }
        Ok(())
    }
}

/// Delivers queued notifications to every notifier
pub struct NotificationWorker {
    receiver: mpsc::Receiver<Notification>,
    notifiers: Vec<Arc<dyn AlertNotifier>>,
    units: BTreeMap<Category, String>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    metrics: MonitorMetrics,
}

impl NotificationWorker {
    pub fn new(
        receiver: mpsc::Receiver<Notification>,
        notifiers: Vec<Arc<dyn AlertNotifier>>,
        units: BTreeMap<Category, String>,
    ) -> Self {
        Self {
            receiver,
            notifiers,
            units,
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

    /// Drain the outbox until shutdown or until every sender is gone
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(notifiers = self.notifiers.len(), "Starting notification worker");

        loop {
            tokio::select! {
                next = self.receiver.recv() => {
                    match next {
                        Some(notification) => {
                            self.deliver(&notification).await;
                        }
                        None => {
                            info!("Notification outbox closed");
                            break;
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Notification worker received shutdown signal");
                    break;
                }
            }
        }
    }

    /// Send one notification to every notifier, returning the success count
    pub async fn deliver(&self, notification: &Notification) -> usize {
        let unit = self
            .units
            .get(&notification.category)
            .map(String::as_str)
            .unwrap_or("");
        let message = AlertMessage::render(notification.category, unit, &notification.alert);

        let mut delivered = 0;
        let mut last_error = None;
        for notifier in &self.notifiers {
            match notifier.notify(&message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    let error = format!("{e:#}");
                    self.metrics.inc_notification_failures(notifier.name());
                    match &self.logger {
                        Some(logger) => {
                            logger.log_notification_failed(notifier.name(), notification.category, &error)
                        }
                        None => warn!(notifier = notifier.name(), error = %error, "Notification failed"),
                    }
                    last_error = Some(format!("{}: {}", notifier.name(), error));
                }
            }
        }

        if let Some(health) = &self.health {
            match last_error {
                Some(error) => health.set_degraded(Component::Notifier, error).await,
                None => health.set_healthy(Component::Notifier).await,
            }
        }

        delivered
    }
}
