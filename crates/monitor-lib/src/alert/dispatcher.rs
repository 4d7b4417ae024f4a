//! Globally rate-limited alert dispatch
//!
//! A single cooldown applies across every category and cadence: once an
//! alert has been handed off, nothing else is notified until the cooldown
//! has elapsed.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

use crate::config::AlertConfig;
use crate::models::{unix_now, AlertRecord, Category};
use crate::observability::MonitorMetrics;

/// Source of the current time in seconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now(&self) -> f64;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        unix_now()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(now: f64) -> Self {
        Self {
            bits: AtomicU64::new(now.to_bits()),
        }
    }

    pub fn set(&self, now: f64) {
        self.bits.store(now.to_bits(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: f64) {
        self.set(self.now() + secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}

/// An alert that passed the cooldown, queued for the notifiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub category: Category,
    pub alert: AlertRecord,
}

/// Outcome of offering one alert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handed to the outbox; the cooldown restarts
    Delivered,
    /// Inside the cooldown window of the previous delivery
    CoolingDown,
    OutboxFull,
    /// The notification worker has stopped
    OutboxClosed,
}

impl Dispatch {
    pub fn is_delivered(self) -> bool {
        self == Dispatch::Delivered
    }

    pub fn reason(self) -> &'static str {
        match self {
            Dispatch::Delivered => "delivered",
            Dispatch::CoolingDown => "cooldown",
            Dispatch::OutboxFull => "outbox full",
            Dispatch::OutboxClosed => "outbox closed",
        }
    }
}

/// Decides which alerts reach the notification outbox
pub struct AlertDispatcher {
    cooldown: Duration,
    /// Time of the last successful hand-off
    last_alert_time: Mutex<Option<f64>>,
    outbox: mpsc::Sender<Notification>,
    clock: Arc<dyn Clock>,
    metrics: MonitorMetrics,
}

impl AlertDispatcher {
    pub fn new(cooldown: Duration, outbox: mpsc::Sender<Notification>) -> Self {
        Self {
            cooldown,
            last_alert_time: Mutex::new(None),
            outbox,
            clock: Arc::new(SystemClock),
            metrics: MonitorMetrics::new(),
        }
    }

    /// Create a dispatcher together with the receiving end of its outbox
    pub fn channel(config: &AlertConfig) -> (Self, mpsc::Receiver<Notification>) {
        let (tx, rx) = mpsc::channel(config.outbox_size.max(1));
        (Self::new(config.cooldown(), tx), rx)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Offer an alert at the dispatcher clock's current time
    ///
    /// Returns `true` when the alert was handed to the outbox.
    pub fn offer(&self, category: Category, alert: AlertRecord) -> bool {
        self.dispatch(category, alert).is_delivered()
    }

    /// Offer an alert at an explicit time
    pub fn offer_at(&self, category: Category, alert: AlertRecord, now: f64) -> bool {
        self.dispatch_at(category, alert, now).is_delivered()
    }

    /// Like [`offer`](Self::offer), reporting why an alert was not delivered
    pub fn dispatch(&self, category: Category, alert: AlertRecord) -> Dispatch {
        self.dispatch_at(category, alert, self.clock.now())
    }

    pub fn dispatch_at(&self, category: Category, alert: AlertRecord, now: f64) -> Dispatch {
        let mut last_alert_time = self
            .last_alert_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = *last_alert_time {
            if now - last <= self.cooldown.as_secs_f64() {
                self.metrics.inc_alerts_suppressed();
                return Dispatch::CoolingDown;
            }
        }

        match self.outbox.try_send(Notification { category, alert }) {
            Ok(()) => {
                *last_alert_time = Some(now);
                self.metrics.inc_alerts_delivered();
                Dispatch::Delivered
            }
            Err(TrySendError::Full(_)) => {
                warn!(
                    event = "outbox_full",
                    category = %category,
                    "Notification outbox full, alert not delivered"
                );
                self.metrics.inc_alerts_suppressed();
                Dispatch::OutboxFull
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    event = "outbox_closed",
                    category = %category,
                    "Notification worker stopped, alert not delivered"
                );
                self.metrics.inc_alerts_suppressed();
                Dispatch::OutboxClosed
            }
        }
    }

    pub fn last_alert_time(&self) -> Option<f64> {
        *self
            .last_alert_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}
