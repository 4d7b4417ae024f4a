//! Errors surfaced by the telemetry core
//!
//! Only caller misuse is an error here. Dropped duplicate samples and
//! zero-interval pairs are normal outcomes and never produce a value of
//! this type.

use crate::models::Category;

/// Errors that can occur when configuring, feeding or querying telemetry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TelemetryError {
    /// The string does not name any known measurement category.
    #[error("unknown category '{0}'")]
    UnknownCategory(String),

    /// The category exists but has no configured series.
    #[error("category '{0}' is not configured")]
    CategoryNotConfigured(Category),

    /// The category has no series with the requested cadence.
    #[error("category '{category}' has no series with cadence {cadence_secs}s")]
    UnknownCadence { category: Category, cadence_secs: u64 },

    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The ingestion queue is full; the reading was not enqueued.
    #[error("ingestion queue is full")]
    IngestQueueFull,

    /// The telemetry engine has stopped accepting readings.
    #[error("ingestion engine is not running")]
    IngestClosed,
}

/// Convenience `Result` alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;
