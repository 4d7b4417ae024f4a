//! Core data models for the tank monitor

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TelemetryError;

/// Current wall-clock time in fractional seconds since the Unix epoch
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Measurement category reported by a sensor driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Tank contents, derived from the calibrated range finder
    Depth,
    /// Water density from the density meter
    Density,
    /// Water temperature
    WaterTemp,
    /// Raw range-finder distance to the water surface
    Distance,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Depth,
        Category::Density,
        Category::WaterTemp,
        Category::Distance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Depth => "depth",
            Category::Density => "density",
            Category::WaterTemp => "water_temp",
            Category::Distance => "distance",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TelemetryError::UnknownCategory(s.to_string()))
    }
}

/// A point on a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Seconds since the Unix epoch
    pub timestamp: f64,
    pub value: f64,
}

impl SampleRecord {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// A data point that caused an alert
///
/// `delta` is `None` for level alerts and carries the per-minute rate for
/// rate-of-change alerts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: f64,
    pub value: f64,
    pub delta: Option<f64>,
}

impl AlertRecord {
    pub fn level(record: &SampleRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            value: record.value,
            delta: None,
        }
    }

    pub fn rate(record: &SampleRecord, delta: f64) -> Self {
        Self {
            timestamp: record.timestamp,
            value: record.value,
            delta: Some(delta),
        }
    }

    pub fn kind(&self) -> AlertKind {
        match self.delta {
            None => AlertKind::Level,
            Some(_) => AlertKind::Rate,
        }
    }
}

/// Alert classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Level,
    Rate,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::Level => write!(f, "level"),
            AlertKind::Rate => write!(f, "rate"),
        }
    }
}

/// Direction in which a value crosses its threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    /// Trips when the value falls below the threshold
    #[default]
    LessThan,
    /// Trips when the value rises above the threshold
    GreaterThan,
}

impl Comparator {
    pub fn trips(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::LessThan => value < threshold,
            Comparator::GreaterThan => value > threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_round_trips_through_str() {
        for category in Category::ALL {
            assert_eq!(category.as_str().parse::<Category>().unwrap(), category);
        }
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        let err = "pressure".parse::<Category>().unwrap_err();
        assert_eq!(err, TelemetryError::UnknownCategory("pressure".to_string()));
    }

    #[test]
    fn test_category_serde_uses_snake_case() {
        let json = serde_json::to_string(&Category::WaterTemp).unwrap();
        assert_eq!(json, "\"water_temp\"");
    }

    #[test]
    fn test_comparator_sense() {
        assert!(Comparator::LessThan.trips(-8.0, -2.0));
        assert!(!Comparator::LessThan.trips(-2.0, -2.0));
        assert!(Comparator::GreaterThan.trips(0.05, 0.02));
        assert!(!Comparator::GreaterThan.trips(0.02, 0.02));
    }

    #[test]
    fn test_alert_kind() {
        let sample = SampleRecord::new(10.0, 9500.0);
        assert_eq!(AlertRecord::level(&sample).kind(), AlertKind::Level);
        assert_eq!(AlertRecord::rate(&sample, -8.0).kind(), AlertKind::Rate);
    }
}
