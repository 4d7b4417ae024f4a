//! Rate of change between two samples

use crate::models::SampleRecord;

/// Interval and rate between two samples
///
/// Both fields are `None` when there is no previous sample or the samples
/// share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RateOfChange {
    /// Seconds between the samples
    pub interval: Option<f64>,
    /// Change in value per minute
    pub rate: Option<f64>,
}

/// Compute the per-minute rate of change from `previous` to `current`
pub fn rate_of_change(current: &SampleRecord, previous: Option<&SampleRecord>) -> RateOfChange {
    let Some(previous) = previous else {
        return RateOfChange::default();
    };

    let interval = current.timestamp - previous.timestamp;
    if interval == 0.0 {
        return RateOfChange::default();
    }

    RateOfChange {
        interval: Some(interval),
        rate: Some(60.0 * (current.value - previous.value) / interval),
    }
}
