//! Push of ingested readings to live listeners
//!
//! Each listener owns a bounded channel. A listener that has gone away or
//! cannot keep up is dropped on the next publish; the others are unaffected.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::models::Category;
use crate::observability::{MonitorMetrics, StructuredLogger};

/// Default per-listener buffer
pub const DEFAULT_LIVE_BUFFER: usize = 256;

/// Event pushed to live listeners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LiveEvent {
    LogValue {
        category: Category,
        unit: String,
        timestamp: f64,
        value: f64,
    },
}

/// A registered listener's end of the feed
#[derive(Debug)]
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::Receiver<LiveEvent>,
}

struct Listener {
    id: u64,
    sender: mpsc::Sender<LiveEvent>,
}

/// Fan-out of live events to subscribed listeners
pub struct LiveFeed {
    listeners: Mutex<Vec<Listener>>,
    next_id: AtomicU64,
    buffer: usize,
    logger: Option<StructuredLogger>,
    metrics: MonitorMetrics,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(DEFAULT_LIVE_BUFFER)
    }
}

impl LiveFeed {
    pub fn new(buffer: usize) -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
            logger: None,
            metrics: MonitorMetrics::new(),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.buffer);

        let mut listeners = self.lock();
        listeners.push(Listener { id, sender });
        self.metrics.set_live_subscribers(listeners.len() as i64);

        Subscription { id, receiver }
    }

    /// Remove a listener; returns whether it was registered
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        self.metrics.set_live_subscribers(listeners.len() as i64);
        listeners.len() != before
    }

    /// Send an event to every listener, returning how many received it
    pub fn publish(&self, event: &LiveEvent) -> usize {
        let mut listeners = self.lock();
        let before = listeners.len();
        let mut delivered = 0;

        listeners.retain(|listener| match listener.sender.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.pruned(listener.id, "listener buffer full");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.pruned(listener.id, "listener disconnected");
                false
            }
        });

        if listeners.len() != before {
            self.metrics.set_live_subscribers(listeners.len() as i64);
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn pruned(&self, id: u64, reason: &str) {
        self.metrics.inc_live_listeners_pruned();
        if let Some(logger) = &self.logger {
            logger.log_listener_pruned(id, reason);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Listener>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
