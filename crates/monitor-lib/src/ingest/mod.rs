//! Ingestion of sensor readings
//!
//! This module provides:
//! - A non-blocking producer handle and the engine task that owns all state
//! - A query handle returning consistent snapshots
//! - The live feed pushing every ingested reading to listeners

mod engine;
mod live;
mod store;

pub use engine::{EngineConfig, IngestHandle, Reading, TelemetryEngine, DEFAULT_QUEUE_SIZE};
pub use live::{LiveEvent, LiveFeed, Subscription, DEFAULT_LIVE_BUFFER};
pub use store::{CategorySummary, TelemetryStore};
