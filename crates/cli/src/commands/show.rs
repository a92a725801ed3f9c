//! Saved anomaly viewer

use anyhow::{Context, Result};
use colored::Colorize;
use tabled::Tabled;

use sentinel_lib::models::AnomalyRecord;
use sentinel_lib::pipeline::ANOMALIES_FILE;
use std::path::Path;

use crate::output::{color_percent, format_value, print_warning, OutputFormat};

/// Row for the anomaly table
#[derive(Tabled)]
struct AnomalyRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "CPU %")]
    cpu: String,
    #[tabled(rename = "Mem %")]
    memory: String,
    #[tabled(rename = "Latency ms")]
    latency_ms: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Metric")]
    metric: String,
}

impl From<&AnomalyRecord> for AnomalyRow {
    fn from(record: &AnomalyRecord) -> Self {
        Self {
            timestamp: record.timestamp.clone(),
            node: record.node.clone(),
            cpu: color_percent(record.cpu),
            memory: color_percent(record.memory),
            latency_ms: format_value(record.latency_ms, 0),
            score: format_value(record.zscore, 2),
            metric: record.metric.clone(),
        }
    }
}

/// Read the anomaly table of the last run
pub fn load_records(dir: &Path) -> Result<Vec<AnomalyRecord>> {
    let path = dir.join(ANOMALIES_FILE);
    let mut reader = csv::Reader::from_path(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<AnomalyRecord>, _>>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Show the anomalies saved by the last run
pub fn show_anomalies(dir: &Path, format: OutputFormat) -> Result<()> {
    let records = load_records(dir)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Table => {
            if records.is_empty() {
                print_warning("No anomalies saved by the last run");
                return Ok(());
            }

            println!("{}", "Last Run Anomalies".bold());
            let rows: Vec<AnomalyRow> = records.iter().map(AnomalyRow::from).collect();
            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!("\nTotal: {} anomalies", records.len());
        }
    }

    Ok(())
}
