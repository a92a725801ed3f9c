//! Ad-hoc advisor command

use anyhow::Result;
use chrono::{Duration, Utc};
use colored::Colorize;

use sentinel_lib::advisor;
use sentinel_lib::models::MetricRow;

use crate::output::{color_severity, OutputFormat};

/// Print the suggestion for one reading
pub fn advise(
    node: &str,
    cpu: f64,
    memory: f64,
    latency_ms: f64,
    recurring: usize,
    format: OutputFormat,
) -> Result<()> {
    let now = Utc::now();
    let row = MetricRow::new(now, node, cpu, memory, latency_ms);

    // Earlier anomalies only count through their node and order
    let history: Vec<MetricRow> = (1..=recurring)
        .rev()
        .map(|i| MetricRow::new(now - Duration::minutes(i as i64), node, cpu, memory, latency_ms))
        .collect();

    let advice = advisor::assess(&row, Some(history.as_slice()));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&advice)?);
        }
        OutputFormat::Table => {
            println!(
                "{} {} ({})",
                "Rule:".bold(),
                advice.rule,
                color_severity(advice.severity)
            );
            println!();
            println!("{}", advice);
        }
    }

    Ok(())
}
