//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use vmi_agent_lib::StatSample;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&items),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    if let Ok(json) = serde_json::to_string_pretty(value) {
        println!("{}", json);
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "up" | "ready" => status.green().to_string(),
        "degraded" | "unknown" | "dormant" => status.yellow().to_string(),
        "unhealthy" | "down" | "not ready" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Render positional labels as `name=value` pairs
pub fn format_labels(names: &[String], values: &[String]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Row for stat sample tables
#[derive(Tabled, Serialize)]
pub struct SampleRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Labels")]
    pub labels: String,
    #[tabled(rename = "Value")]
    pub value: f64,
}

impl From<&StatSample> for SampleRow {
    fn from(sample: &StatSample) -> Self {
        Self {
            metric: sample.metric.clone(),
            labels: format_labels(&sample.label_names, &sample.labels),
            value: sample.value,
        }
    }
}

/// Print stat samples; JSON output keeps the positional wire form
pub fn print_samples(samples: &[StatSample], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let rows: Vec<SampleRow> = samples.iter().map(SampleRow::from).collect();
            print_table(&rows, format);
        }
        OutputFormat::Json => print_json(samples),
    }
}
