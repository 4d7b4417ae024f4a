//! Telemetry library for the tank monitor
//!
//! This crate provides the core functionality for:
//! - Bounded multi-cadence histories of sensor readings
//! - Rate-of-change and level alerting
//! - Globally rate-limited alert notification
//! - Live distribution of readings to subscribers
//! - Health checks and observability

pub mod alert;
pub mod config;
pub mod error;
pub mod export;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod series;
pub mod source;

pub use config::{AlertConfig, CategoryConfig, SeriesConfig, TelemetryConfig};
pub use error::{Result, TelemetryError};
pub use health::{Component, ComponentHealth, ComponentStatus, HealthRegistry};
pub use models::*;
pub use observability::{MonitorMetrics, StructuredLogger};
