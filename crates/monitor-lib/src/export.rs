//! Serialization of series for download and charting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

use crate::models::{Category, SampleRecord};

/// Timestamp layout used in TSV rows
const TSV_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Output format of a history download
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// `{label, values: [[ts, value], ...]}` chart series
    #[default]
    #[serde(alias = "nvd3")]
    Labeled,
    /// Tab-separated values with a quoted header row
    Tsv,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "labeled" | "nvd3" => Ok(ExportFormat::Labeled),
            "tsv" => Ok(ExportFormat::Tsv),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

/// A named series of `(timestamp, value)` points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSeries {
    pub label: String,
    pub values: Vec<(f64, f64)>,
}

impl LabeledSeries {
    pub fn new(label: impl Into<String>, records: &[SampleRecord]) -> Self {
        Self {
            label: label.into(),
            values: records.iter().map(|r| (r.timestamp, r.value)).collect(),
        }
    }
}

/// Label of a category's history or rate series
pub fn series_label(category: Category, unit: &str, deltas: bool) -> String {
    if deltas {
        format!("{category} rate of change ({unit}/min)")
    } else {
        format!("{category} ({unit})")
    }
}

/// Header cell naming the value column
fn value_heading(unit: &str, deltas: bool) -> String {
    if deltas {
        format!("Rate of Change ({unit}/min)")
    } else {
        unit.to_string()
    }
}

/// Render records as TSV, one `time<TAB>value` row per record
pub fn to_tsv(records: &[SampleRecord], unit: &str, deltas: bool) -> String {
    let mut out = format!("\"Timestamp\"\t\"{}\"\n", value_heading(unit, deltas));
    for record in records {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}\t{}", format_timestamp(record.timestamp), record.value);
    }
    out
}

/// Convert fractional epoch seconds to a UTC datetime
pub fn to_datetime(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9) as u32;
    DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
}

/// `YYYY-MM-DD HH:MM:SS` in UTC, or the raw number when out of range
pub fn format_timestamp(timestamp: f64) -> String {
    match to_datetime(timestamp) {
        Some(dt) => dt.format(TSV_TIME_FORMAT).to_string(),
        None => timestamp.to_string(),
    }
}
