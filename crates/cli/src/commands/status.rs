//! Category listing and health commands

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::{ApiClient, CategorySummary, HealthResponse, ReadinessResponse};
use crate::output::{color_status, format_timestamp, print_warning, OutputFormat};

/// Row for categories table
#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Cadences")]
    cadences: String,
}

/// Row for component health table
#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Checked (UTC)")]
    checked: String,
}

/// List configured categories
pub async fn show_categories(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let result: Vec<CategorySummary> = client.get("categories").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{}", json);
        }
        OutputFormat::Tsv => {
            println!("\"Category\"\t\"Unit\"\t\"Cadences\"");
            for c in &result {
                println!("{}\t{}\t{}", c.category, c.unit, join_cadences(&c.cadences_secs));
            }
        }
        OutputFormat::Table => {
            if result.is_empty() {
                print_warning("No categories configured");
                return Ok(());
            }

            let rows: Vec<CategoryRow> = result
                .iter()
                .map(|c| CategoryRow {
                    category: c.category.clone(),
                    unit: c.unit.clone(),
                    cadences: join_cadences(&c.cadences_secs),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

/// Show liveness and readiness of the monitor
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health: HealthResponse = client.get_probe("healthz").await?;
    let readiness: ReadinessResponse = client.get_probe("readyz").await?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "health": health,
                "readiness": readiness,
            }))?;
            println!("{}", json);
        }
        OutputFormat::Table | OutputFormat::Tsv => {
            println!("{}", "Monitor Health".bold());
            println!("{}", "=".repeat(50));
            println!("Status: {}", color_status(&health.status));
            let ready = if readiness.ready { "ready" } else { "not ready" };
            println!("Ready:  {}", color_status(ready));
            if let Some(reason) = &readiness.reason {
                println!("Reason: {}", reason.yellow());
            }
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    component: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                    checked: format_timestamp(component.last_check_timestamp as f64),
                })
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }

    Ok(())
}

fn join_cadences(cadences: &[u64]) -> String {
    cadences
        .iter()
        .map(|c| format!("{}s", c))
        .collect::<Vec<_>>()
        .join(", ")
}
