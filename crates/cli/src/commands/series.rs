//! History and rate-of-change commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{logger_path, ApiClient, LabeledSeries};
use crate::output::{color_rate, format_timestamp, format_value, print_info, print_warning, OutputFormat};

/// Row for history and deltas tables
#[derive(Tabled)]
struct PointRow {
    #[tabled(rename = "Timestamp (UTC)")]
    timestamp: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Show one category tier's readings or rates
pub async fn show_series(
    client: &ApiClient,
    category: &str,
    cadence: u64,
    deltas: bool,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Tsv {
        let body = client
            .get_text(&logger_path(category, cadence, deltas, true))
            .await?;
        print!("{}", body);
        return Ok(());
    }

    let series: LabeledSeries = client
        .get(&logger_path(category, cadence, deltas, false))
        .await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&series)?;
            println!("{}", json);
        }
        OutputFormat::Table | OutputFormat::Tsv => {
            println!("{}", series.label.bold());
            println!("{}", "=".repeat(50));
            println!("Cadence: {}s", cadence.to_string().cyan());
            println!();

            if series.values.is_empty() {
                print_warning("No readings retained yet");
                return Ok(());
            }

            let rows: Vec<PointRow> = series
                .values
                .iter()
                .map(|&(timestamp, value)| PointRow {
                    timestamp: format_timestamp(timestamp),
                    value: if deltas {
                        color_rate(value, format!("{:.2}", value))
                    } else {
                        format_value(value, "")
                    },
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);

            let noun = if deltas { "rates" } else { "readings" };
            print_info(&format!("Total: {} {}", series.values.len(), noun));
        }
    }

    Ok(())
}
