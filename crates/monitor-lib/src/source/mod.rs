//! Sensor reading sources
//!
//! This module provides the range-finder frame reader, the linear
//! calibration that turns a distance into a tank depth, and the loop that
//! feeds readings into the telemetry engine.

mod range_finder;
mod r#loop;

pub use r#loop::SourceLoop;
pub use range_finder::RangeFinderReader;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub use async_trait::async_trait;

/// One raw range-finder measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    /// Distance from the sensor to the water surface
    pub millimetres: f64,
}

/// Linear transform `depth = m * raw + b`
///
/// The parameters are supplied by the operator and are not validated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub m: f64,
    pub b: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self { m: 1.0, b: 0.0 }
    }
}

impl Calibration {
    pub fn new(m: f64, b: f64) -> Self {
        Self { m, b }
    }

    /// Depth for a raw reading, truncated toward zero
    pub fn apply(&self, raw: f64) -> f64 {
        (self.m * raw + self.b).trunc()
    }
}

/// Trait for sensors producing raw readings
#[async_trait]
pub trait ReadingSource: Send {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Next reading, `Ok(None)` once the source is exhausted
    ///
    /// An error reports one unusable frame; the source stays usable.
    async fn next_reading(&mut self) -> Result<Option<RawReading>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_calibration() {
        assert_eq!(Calibration::default().apply(1234.0), 1234.0);
    }

    #[test]
    fn test_tank_calibration() {
        let calibration = Calibration::new(-0.037453, 107.1161);
        // 107.1161 - 0.037453 * 1000 = 69.6631
        assert_eq!(calibration.apply(1000.0), 69.0);
        assert_eq!(calibration.apply(5000.0), -80.0);
    }

    #[test]
    fn test_calibration_deserializes() {
        let calibration: Calibration = serde_json::from_str(r#"{"m": 2.0, "b": -1.5}"#).unwrap();
        assert_eq!(calibration.apply(10.0), 18.0);
    }
}
