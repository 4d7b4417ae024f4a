//! Bounded time-series storage
//!
//! This module provides:
//! - Per-minute rate of change between two samples
//! - Fixed-capacity, cadence-gated histories with rate alerting
//! - The per-category registry of cadence tiers

mod bounded;
mod rate;
mod registry;


pub use bounded::{BoundedTimeSeries, DEFAULT_RATE_THRESHOLD};
pub use rate::{rate_of_change, RateOfChange};
pub use registry::CategoryRegistry;
