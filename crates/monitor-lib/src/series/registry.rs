//! Registry of bounded series per measurement category

use std::collections::BTreeMap;
use std::time::Duration;

use super::bounded::BoundedTimeSeries;
use crate::config::{CategoryConfig, TelemetryConfig};
use crate::error::{Result, TelemetryError};
use crate::models::{AlertRecord, Category, SampleRecord};

/// Cadence tiers and alert policy of one category
#[derive(Debug, Clone)]
struct CategoryEntry {
    unit: String,
    level_low: Option<f64>,
    level_high: Option<f64>,
    /// Ordered by ascending cadence
    series: Vec<BoundedTimeSeries>,
}

impl CategoryEntry {
    fn from_config(config: &CategoryConfig) -> Self {
        let mut series: Vec<BoundedTimeSeries> = config
            .series
            .iter()
            .map(|tier| BoundedTimeSeries::from_config(tier, config.rate_comparator))
            .collect();
        series.sort_by_key(|s| s.cadence_secs());

        Self {
            unit: config.unit.clone(),
            level_low: config.level_low,
            level_high: config.level_high,
            series,
        }
    }

    fn series(&self, category: Category, cadence: Duration) -> Result<&BoundedTimeSeries> {
        self.series
            .iter()
            .find(|s| s.cadence() == cadence)
            .ok_or(TelemetryError::UnknownCadence {
                category,
                cadence_secs: cadence.as_secs(),
            })
    }
}

/// Owns one [`BoundedTimeSeries`] per configured (category, cadence) pair
///
/// Built once from validated configuration. The set of categories and
/// tiers never changes afterwards; only the series contents do.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: BTreeMap<Category, CategoryEntry>,
}

impl CategoryRegistry {
    /// Validate the configuration and build every series
    pub fn from_config(config: &TelemetryConfig) -> Result<Self> {
        config.validate()?;

        let categories = config
            .categories
            .iter()
            .map(|(category, cfg)| (*category, CategoryEntry::from_config(cfg)))
            .collect();

        Ok(Self { categories })
    }

    fn entry(&self, category: Category) -> Result<&CategoryEntry> {
        self.categories
            .get(&category)
            .ok_or(TelemetryError::CategoryNotConfigured(category))
    }

    /// Offer one reading to every cadence tier of `category`
    ///
    /// Returns the rate alerts raised by the tiers that accepted the reading.
    pub fn offer(&mut self, category: Category, timestamp: f64, value: f64) -> Result<Vec<AlertRecord>> {
        let entry = self
            .categories
            .get_mut(&category)
            .ok_or(TelemetryError::CategoryNotConfigured(category))?;

        let record = SampleRecord::new(timestamp, value);
        Ok(entry
            .series
            .iter_mut()
            .filter_map(|series| series.offer(record))
            .collect())
    }

    /// Check a reading against the category's absolute level bounds
    pub fn level_alert(&self, category: Category, timestamp: f64, value: f64) -> Result<Option<AlertRecord>> {
        let entry = self.entry(category)?;

        let below = entry.level_low.is_some_and(|low| value < low);
        let above = entry.level_high.is_some_and(|high| value > high);

        Ok((below || above).then(|| AlertRecord::level(&SampleRecord::new(timestamp, value))))
    }

    /// Retained samples of one tier, oldest first
    pub fn history(&self, category: Category, cadence: Duration) -> Result<Vec<SampleRecord>> {
        Ok(self.entry(category)?.series(category, cadence)?.snapshot())
    }

    /// Derived per-minute rates of one tier
    pub fn deltas(&self, category: Category, cadence: Duration) -> Result<Vec<SampleRecord>> {
        Ok(self.entry(category)?.series(category, cadence)?.deltas())
    }

    /// Borrow one tier
    pub fn series(&self, category: Category, cadence: Duration) -> Result<&BoundedTimeSeries> {
        self.entry(category)?.series(category, cadence)
    }

    pub fn unit(&self, category: Category) -> Result<&str> {
        Ok(self.entry(category)?.unit.as_str())
    }

    /// Configured cadences of a category, ascending
    pub fn cadences(&self, category: Category) -> Result<Vec<Duration>> {
        Ok(self
            .entry(category)?
            .series
            .iter()
            .map(|s| s.cadence())
            .collect())
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.keys().copied()
    }

    pub fn contains(&self, category: Category) -> bool {
        self.categories.contains_key(&category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AlertConfig, SeriesConfig};
    use crate::models::Comparator;

    fn depth_only() -> TelemetryConfig {
        let mut categories = BTreeMap::new();
        categories.insert(
            Category::Depth,
            CategoryConfig {
                unit: "litres".to_string(),
                level_low: Some(10_000.0),
                level_high: None,
                rate_comparator: Comparator::LessThan,
                series: vec![
                    SeriesConfig::new(3600, 24, Some(-2.0)),
                    SeriesConfig::new(10, 5, Some(-2.0)),
                    SeriesConfig::new(60, 5, None),
                ],
            },
        );
        TelemetryConfig {
            alerts: AlertConfig::default(),
            categories,
        }
    }

    #[test]
    fn test_series_sorted_by_cadence() {
        let registry = CategoryRegistry::from_config(&depth_only()).unwrap();
        assert_eq!(
            registry.cadences(Category::Depth).unwrap(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(60),
                Duration::from_secs(3600)
            ]
        );
    }

    #[test]
    fn test_offer_fans_out_to_every_tier() {
        let mut registry = CategoryRegistry::from_config(&depth_only()).unwrap();
        registry.offer(Category::Depth, 0.0, 20_000.0).unwrap();

        for cadence in registry.cadences(Category::Depth).unwrap() {
            assert_eq!(
                registry.history(Category::Depth, cadence).unwrap(),
                vec![SampleRecord::new(0.0, 20_000.0)]
            );
        }
    }

    #[test]
    fn test_offer_collects_alerts_from_enabled_tiers() {
        let mut registry = CategoryRegistry::from_config(&depth_only()).unwrap();
        assert!(registry.offer(Category::Depth, 0.0, 50.0).unwrap().is_empty());

        // Accepted by the 10s and 60s tiers, the 60s tier has rate alerts disabled
        let alerts = registry.offer(Category::Depth, 61.0, 42.0).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].delta.unwrap() < -2.0);

        // Accepted by all three tiers, two of which alert
        let alerts = registry.offer(Category::Depth, 3700.0, -1000.0).unwrap();
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn test_unconfigured_category_is_an_error() {
        let mut registry = CategoryRegistry::from_config(&depth_only()).unwrap();
        assert_eq!(
            registry.offer(Category::Density, 0.0, 1.0),
            Err(TelemetryError::CategoryNotConfigured(Category::Density))
        );
        assert!(registry.history(Category::Density, Duration::from_secs(60)).is_err());
        assert!(!registry.contains(Category::Density));
    }

    #[test]
    fn test_unknown_cadence_is_an_error() {
        let registry = CategoryRegistry::from_config(&depth_only()).unwrap();
        assert_eq!(
            registry.deltas(Category::Depth, Duration::from_secs(30)),
            Err(TelemetryError::UnknownCadence {
                category: Category::Depth,
                cadence_secs: 30
            })
        );
    }

    #[test]
    fn test_level_alert_below_low_threshold() {
        let registry = CategoryRegistry::from_config(&depth_only()).unwrap();
        let alert = registry.level_alert(Category::Depth, 5.0, 9500.0).unwrap().unwrap();
        assert_eq!(alert.delta, None);
        assert_eq!(alert.value, 9500.0);
        assert!(registry.level_alert(Category::Depth, 5.0, 10_500.0).unwrap().is_none());
    }

    #[test]
    fn test_level_alert_above_high_threshold() {
        let registry = CategoryRegistry::from_config(&TelemetryConfig::default()).unwrap();
        assert!(registry
            .level_alert(Category::Density, 0.0, 1.010)
            .unwrap()
            .is_some());
        assert!(registry
            .level_alert(Category::Density, 0.0, 1.000)
            .unwrap()
            .is_none());
        // No level bounds configured
        assert!(registry
            .level_alert(Category::WaterTemp, 0.0, -40.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_invalid_config_refused() {
        let mut config = depth_only();
        config.categories.get_mut(&Category::Depth).unwrap().series[0].capacity = 0;
        assert!(matches!(
            CategoryRegistry::from_config(&config),
            Err(TelemetryError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unit_lookup() {
        let registry = CategoryRegistry::from_config(&TelemetryConfig::default()).unwrap();
        assert_eq!(registry.unit(Category::Distance).unwrap(), "mm");
        assert_eq!(registry.categories().count(), 4);
    }
}
