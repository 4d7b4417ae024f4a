//! Tank monitor daemon
//!
//! Wires the telemetry engine, alert notification, reading sources and
//! the HTTP API together.

pub mod api;
pub mod config;
