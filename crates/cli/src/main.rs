//! Tank Monitor CLI
//!
//! A command-line tool for querying reading histories, rates of change
//! and health from a running tank monitor.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{series, status};

/// API endpoint used when neither the flag, the environment nor the config file names one
const DEFAULT_API_URL: &str = "http://localhost:4242";

/// Tank Monitor CLI
#[derive(Parser)]
#[command(name = "tankctl")]
#[command(author, version, about = "CLI for the Tank Monitor", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via TANKCTL_API_URL env var)
    #[arg(long, env = "TANKCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the retained readings of a category
    History {
        /// Measurement category (depth, density, water_temp, distance)
        category: String,

        /// Cadence tier in seconds
        #[arg(default_value_t = 60)]
        cadence: u64,
    },

    /// Show the per-minute rate of change of a category
    Deltas {
        /// Measurement category (depth, density, water_temp, distance)
        category: String,

        /// Cadence tier in seconds
        #[arg(default_value_t = 60)]
        cadence: u64,
    },

    /// List configured categories with their units and cadences
    Categories,

    /// Show component health and readiness
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let api_url = match cli.api_url {
        Some(url) => url,
        None => config::Config::load()?
            .api_url
            .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
    };

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match cli.command {
        Commands::History { category, cadence } => {
            series::show_series(&client, &category, cadence, false, cli.format).await?;
        }
        Commands::Deltas { category, cadence } => {
            series::show_series(&client, &category, cadence, true, cli.format).await?;
        }
        Commands::Categories => {
            status::show_categories(&client, cli.format).await?;
        }
        Commands::Health => {
            status::show_health(&client, cli.format).await?;
        }
    }

    Ok(())
}
