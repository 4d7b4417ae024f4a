//! Alert dispatch and notification
//!
//! This module provides:
//! - A globally rate-limited dispatcher deciding which alerts are notified
//! - The notifier contract and log/webhook implementations
//! - A worker delivering queued notifications off the ingestion path

mod dispatcher;
mod notifier;

pub use dispatcher::{AlertDispatcher, Clock, Dispatch, ManualClock, Notification, SystemClock};
pub use notifier::{
    AlertMessage, AlertNotifier, AlertmanagerAlert, AlertmanagerPayload, LogNotifier,
    NotificationWorker, WebhookNotifier,
};
