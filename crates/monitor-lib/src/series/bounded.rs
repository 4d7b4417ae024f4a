//! Cadence-gated, fixed-capacity history of one category
//!
//! A series keeps at most one sample per cadence-sized bucket: a sample is
//! retained only when its timestamp exceeds the boundary set by the last
//! retained sample. When full, the oldest sample is evicted first.

use std::collections::VecDeque;
use std::time::Duration;

use super::rate::rate_of_change;
use crate::config::{SeriesConfig, DEFAULT_CAPACITY};
use crate::models::{AlertRecord, Comparator, SampleRecord};

/// Default rate-of-change alert threshold (units per minute)
pub const DEFAULT_RATE_THRESHOLD: f64 = -2.0;

/// Bounded history for one (category, cadence) pair
#[derive(Debug, Clone)]
pub struct BoundedTimeSeries {
    /// Minimum seconds between retained samples
    cadence: f64,
    capacity: usize,
    /// Boundary a new sample must exceed; unset until the first sample
    next_capture: Option<f64>,
    history: VecDeque<SampleRecord>,
    rate_threshold: Option<f64>,
    comparator: Comparator,
}

impl BoundedTimeSeries {
    /// Create a series with the default threshold and comparator
    pub fn new(cadence: Duration, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            cadence: cadence.as_secs_f64(),
            capacity,
            next_capture: None,
            history: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            rate_threshold: Some(DEFAULT_RATE_THRESHOLD),
            comparator: Comparator::default(),
        }
    }

    /// Create a series from one configured tier
    pub fn from_config(config: &SeriesConfig, comparator: Comparator) -> Self {
        Self::new(config.cadence(), config.capacity)
            .with_rate_threshold(config.rate_threshold)
            .with_comparator(comparator)
    }

    /// Set the rate threshold; `None` disables rate alerts
    pub fn with_rate_threshold(mut self, threshold: Option<f64>) -> Self {
        self.rate_threshold = threshold;
        self
    }

    pub fn with_comparator(mut self, comparator: Comparator) -> Self {
        self.comparator = comparator;
        self
    }

    /// Offer a sample to the series
    ///
    /// Samples inside the current bucket, or with a non-finite timestamp or
    /// value, are dropped silently. An accepted sample is compared with the
    /// sample accepted just before it; a rate alert is returned when the
    /// per-minute rate trips the threshold.
    pub fn offer(&mut self, record: SampleRecord) -> Option<AlertRecord> {
        if !record.timestamp.is_finite() || !record.value.is_finite() {
            return None;
        }
        if let Some(boundary) = self.next_capture {
            if record.timestamp <= boundary {
                return None;
            }
        }

        // Captured before the append so eviction at capacity 1 cannot lose it
        let previous = self.history.back().copied();

        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(record);
        self.next_capture = Some(record.timestamp + self.cadence);

        let rate = rate_of_change(&record, previous.as_ref()).rate?;
        let threshold = self.rate_threshold?;
        self.comparator
            .trips(rate, threshold)
            .then(|| AlertRecord::rate(&record, rate))
    }

    /// Retained samples, oldest first
    pub fn records(&self) -> impl Iterator<Item = &SampleRecord> + '_ {
        self.history.iter()
    }

    /// Owned copy of the retained samples, oldest first
    pub fn snapshot(&self) -> Vec<SampleRecord> {
        self.history.iter().copied().collect()
    }

    /// Per-minute rates between consecutive retained samples
    ///
    /// Each derived point sits at the midpoint of its two source samples.
    /// Recomputed on every call.
    pub fn deltas(&self) -> Vec<SampleRecord> {
        self.history
            .iter()
            .zip(self.history.iter().skip(1))
            .filter_map(|(previous, current)| {
                let change = rate_of_change(current, Some(previous));
                let (interval, rate) = (change.interval?, change.rate?);
                Some(SampleRecord::new(previous.timestamp + 0.5 * interval, rate))
            })
            .collect()
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs_f64(self.cadence)
    }

    pub fn cadence_secs(&self) -> u64 {
        self.cadence as u64
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn next_capture(&self) -> Option<f64> {
        self.next_capture
    }

    pub fn rate_threshold(&self) -> Option<f64> {
        self.rate_threshold
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }
}
