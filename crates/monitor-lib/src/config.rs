//! Telemetry configuration
//!
//! Static per-category configuration: cadence tiers, capacities, rate and
//! level thresholds, units, and the global alert cooldown. The defaults
//! mirror a single-tank installation with a range finder and a density
//! meter.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use crate::error::{Result, TelemetryError};
use crate::models::{Category, Comparator};

/// Default number of records retained per series (one day of minutes)
pub const DEFAULT_CAPACITY: usize = 1440;

/// Default minimum time between two delivered alert notifications
pub const DEFAULT_COOLDOWN_SECS: u64 = 3600;

/// Default number of notifications that may wait for delivery
pub const DEFAULT_OUTBOX_SIZE: usize = 64;

/// One cadence tier of a category
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeriesConfig {
    /// Minimum seconds between two retained samples
    pub cadence_secs: u64,

    /// Maximum number of retained samples
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Rate-of-change threshold in units per minute; `None` disables rate alerts
    #[serde(default)]
    pub rate_threshold: Option<f64>,
}

impl SeriesConfig {
    pub fn new(cadence_secs: u64, capacity: usize, rate_threshold: Option<f64>) -> Self {
        Self {
            cadence_secs,
            capacity,
            rate_threshold,
        }
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }
}

/// Alert and retention policy for one measurement category
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CategoryConfig {
    /// Human-readable unit used in exports and live events
    pub unit: String,

    /// Level alert when a reading falls below this value
    #[serde(default)]
    pub level_low: Option<f64>,

    /// Level alert when a reading rises above this value
    #[serde(default)]
    pub level_high: Option<f64>,

    /// Direction in which the rate threshold trips
    #[serde(default)]
    pub rate_comparator: Comparator,

    /// Cadence tiers, one bounded series each
    pub series: Vec<SeriesConfig>,
}

impl CategoryConfig {
    fn with_tiers(unit: &str, rate_threshold: Option<f64>) -> Self {
        Self {
            unit: unit.to_string(),
            level_low: None,
            level_high: None,
            rate_comparator: Comparator::LessThan,
            series: vec![
                SeriesConfig::new(60, DEFAULT_CAPACITY, rate_threshold),
                SeriesConfig::new(3600, DEFAULT_CAPACITY, rate_threshold),
            ],
        }
    }
}

/// Global alert dispatch settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertConfig {
    /// Minimum seconds between two delivered notifications, across all categories
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Capacity of the notification outbox
    #[serde(default = "default_outbox_size")]
    pub outbox_size: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            outbox_size: DEFAULT_OUTBOX_SIZE,
        }
    }
}

impl AlertConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Complete telemetry configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default)]
    pub alerts: AlertConfig,

    #[serde(default = "default_categories")]
    pub categories: BTreeMap<Category, CategoryConfig>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            alerts: AlertConfig::default(),
            categories: default_categories(),
        }
    }
}

impl TelemetryConfig {
    /// Display unit of every configured category
    pub fn units(&self) -> BTreeMap<Category, String> {
        self.categories
            .iter()
            .map(|(category, cfg)| (*category, cfg.unit.clone()))
            .collect()
    }

    /// Reject configurations the registry and dispatcher cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.alerts.cooldown_secs == 0 {
            return Err(invalid("alert cooldown must be positive"));
        }
        if self.alerts.outbox_size == 0 {
            return Err(invalid("alert outbox size must be positive"));
        }
        if self.categories.is_empty() {
            return Err(invalid("at least one category must be configured"));
        }

        for (category, cfg) in &self.categories {
            if cfg.series.is_empty() {
                return Err(invalid(format!("category '{category}' has no series")));
            }

            for (name, level) in [("level_low", cfg.level_low), ("level_high", cfg.level_high)] {
                if level.is_some_and(|v| !v.is_finite()) {
                    return Err(invalid(format!("category '{category}': {name} must be finite")));
                }
            }
            if let (Some(low), Some(high)) = (cfg.level_low, cfg.level_high) {
                if low >= high {
                    return Err(invalid(format!(
                        "category '{category}': level_low {low} must be below level_high {high}"
                    )));
                }
            }

            let mut seen = HashSet::new();
            for series in &cfg.series {
                if series.cadence_secs == 0 {
                    return Err(invalid(format!("category '{category}': cadence must be positive")));
                }
                if series.capacity == 0 {
                    return Err(invalid(format!(
                        "category '{category}': capacity of the {}s series must be positive",
                        series.cadence_secs
                    )));
                }
                if series.rate_threshold.is_some_and(|t| !t.is_finite()) {
                    return Err(invalid(format!(
                        "category '{category}': rate threshold of the {}s series must be finite",
                        series.cadence_secs
                    )));
                }
                if !seen.insert(series.cadence_secs) {
                    return Err(invalid(format!(
                        "category '{category}': duplicate cadence {}s",
                        series.cadence_secs
                    )));
                }
            }
        }

        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> TelemetryError {
    TelemetryError::InvalidConfig(message.into())
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_cooldown_secs() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

fn default_outbox_size() -> usize {
    DEFAULT_OUTBOX_SIZE
}

fn default_categories() -> BTreeMap<Category, CategoryConfig> {
    let mut categories = BTreeMap::new();

    // Litres; a falling level below 10 000 l or a drain faster than 200 l/min alerts
    let mut depth = CategoryConfig::with_tiers("litres", Some(-200.0));
    depth.level_low = Some(10_000.0);
    categories.insert(Category::Depth, depth);

    // g/cm3; rising density signals contamination
    let mut density = CategoryConfig::with_tiers("density", Some(0.02));
    density.level_high = Some(1.005);
    density.rate_comparator = Comparator::GreaterThan;
    categories.insert(Category::Density, density);

    categories.insert(Category::WaterTemp, CategoryConfig::with_tiers("degrees", None));
    categories.insert(Category::Distance, CategoryConfig::with_tiers("mm", None));

    categories
}
