//! Output formatting utilities

use chrono::DateTime;
use clap::ValueEnum;
use colored::Colorize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
    /// Tab-separated values as served by the monitor
    Tsv,
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format epoch seconds as a UTC date and time
pub fn format_timestamp(timestamp: f64) -> String {
    if !timestamp.is_finite() {
        return timestamp.to_string();
    }
    DateTime::from_timestamp(timestamp.floor() as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Format a reading with its unit
pub fn format_value(value: f64, unit: &str) -> String {
    if unit.is_empty() {
        format!("{:.2}", value)
    } else {
        format!("{:.2} {}", value, unit)
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "ready" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "unhealthy" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color a rate of change: falling red, rising green
pub fn color_rate(rate: f64, formatted: String) -> String {
    if rate < 0.0 {
        formatted.red().to_string()
    } else if rate > 0.0 {
        formatted.green().to_string()
    } else {
        formatted
    }
}
