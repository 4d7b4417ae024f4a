//! Daemon configuration

use anyhow::{Context, Result};
use monitor_lib::{source::Calibration, TelemetryConfig};
use serde::Deserialize;
use std::path::PathBuf;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "TANKMON_CONFIG";

/// Configuration file read when [`CONFIG_PATH_ENV`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "tankmonitor.toml";

/// Serial range finder settings
#[derive(Debug, Clone, Deserialize)]
pub struct RangeFinderConfig {
    /// Character device the sensor streams frames on
    pub device: PathBuf,

    #[serde(default)]
    pub calibration: Calibration,
}

/// Tank monitor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Name of the monitored site, attached to logs and alerts
    #[serde(default = "default_site_name")]
    pub site_name: String,

    /// Port of the HTTP API
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Readings buffered between sources and the telemetry engine
    #[serde(default = "default_ingest_queue_size")]
    pub ingest_queue_size: usize,

    /// Events buffered per live listener before it is dropped
    #[serde(default = "default_live_buffer")]
    pub live_buffer: usize,

    /// Alertmanager-compatible webhook receiving alert notifications
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default)]
    pub range_finder: Option<RangeFinderConfig>,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

fn default_site_name() -> String {
    "tank".to_string()
}

fn default_listen_port() -> u16 {
    4242
}

fn default_ingest_queue_size() -> usize {
    monitor_lib::ingest::DEFAULT_QUEUE_SIZE
}

fn default_live_buffer() -> usize {
    monitor_lib::ingest::DEFAULT_LIVE_BUFFER
}

impl MonitorConfig {
    /// Load configuration from the configured file and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Layer `TANKMON_*` environment variables over an optional file
    ///
    /// The prefix is joined with a single `_` and nested keys use `__`,
    /// e.g. `TANKMON_LISTEN_PORT` or `TANKMON_TELEMETRY__ALERTS__COOLDOWN_SECS`.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("TANKMON")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {path}"))?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.telemetry
            .validate()
            .context("Invalid telemetry configuration")?;
        if self.ingest_queue_size == 0 {
            anyhow::bail!("ingest_queue_size must be positive");
        }
        if self.live_buffer == 0 {
            anyhow::bail!("live_buffer must be positive");
        }
        Ok(())
    }
}
