//! Agent status command

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use tabled::Tabled;

use crate::client::{ApiClient, HealthStatus, Readiness};
use crate::output::{color_status, print_json, print_table, print_warning, OutputFormat};

#[derive(Tabled, Serialize)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Last Check")]
    last_check: String,
}

#[derive(Serialize)]
struct AgentStatus {
    health: HealthStatus,
    readiness: Readiness,
}

fn format_timestamp(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Show agent health and readiness
pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let (_, health): (_, HealthStatus) = client.get_with_status("healthz").await?;
    let (_, readiness): (_, Readiness) = client.get_with_status("readyz").await?;

    if format == OutputFormat::Json {
        print_json(&AgentStatus { health, readiness });
        return Ok(());
    }

    println!("{}", "Agent Status".bold());
    println!("{}", "=".repeat(40));
    println!("Health:    {}", color_status(&health.status));
    let ready = if readiness.ready { "ready" } else { "not ready" };
    println!("Readiness: {}", color_status(ready));
    if let Some(at) = readiness.snapshot_loaded_at {
        println!("Snapshot:  loaded {}", format_timestamp(at.timestamp()));
    }
    if let Some(reason) = &readiness.reason {
        print_warning(reason);
    }
    println!();

    let rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(name, component)| ComponentRow {
            component: name.clone(),
            status: color_status(&component.status),
            message: component.message.clone().unwrap_or_default(),
            last_check: format_timestamp(component.last_check_timestamp),
        })
        .collect();
    print_table(&rows, format);

    Ok(())
}
