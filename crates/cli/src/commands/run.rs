//! Batch run command

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use sentinel_lib::{BatchRun, RunConfig, RunSummary};

use crate::config::resolve_config_path;
use crate::output::{print_info, print_success, print_warning, OutputFormat};

#[derive(Serialize)]
struct RunReport<'a> {
    rows_loaded: usize,
    anomalies_detected: usize,
    alerts_emitted: usize,
    anomalies_path: &'a Path,
    reports_path: &'a Path,
    reports: &'a [String],
}

impl<'a> From<&'a RunSummary> for RunReport<'a> {
    fn from(summary: &'a RunSummary) -> Self {
        Self {
            rows_loaded: summary.rows_loaded,
            anomalies_detected: summary.anomalies_detected,
            alerts_emitted: summary.alerts_emitted,
            anomalies_path: &summary.anomalies_path,
            reports_path: &summary.reports_path,
            reports: &summary.reports,
        }
    }
}

/// Run one batch with the given configuration file
pub fn run_batch(
    config: Option<PathBuf>,
    output_dir: &Path,
    quiet: bool,
    format: OutputFormat,
) -> Result<()> {
    let config_path = resolve_config_path(config)?;
    debug!(path = %config_path.display(), "Using run configuration");
    let mut run_config = RunConfig::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    // JSON output carries the reports itself
    if quiet || matches!(format, OutputFormat::Json) {
        run_config.notifier.print = false;
    }

    let summary = BatchRun::new(run_config, output_dir)
        .run()
        .context("Batch run failed")?;

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&RunReport::from(&summary))?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Run Summary".bold());
            println!("{}", "=".repeat(50));
            println!("Rows loaded:        {}", summary.rows_loaded);
            println!("Anomalies detected: {}", summary.anomalies_detected);
            println!("Alerts emitted:     {}", summary.alerts_emitted);
            println!();

            if summary.anomalies_detected == 0 {
                print_success("No anomalies detected");
            } else if summary.alerts_emitted < summary.anomalies_detected {
                print_warning(&format!(
                    "Reported the latest {} of {} anomalies",
                    summary.alerts_emitted, summary.anomalies_detected
                ));
            }
            print_info(&format!(
                "Anomalies saved to {}",
                summary.anomalies_path.display()
            ));
            print_info(&format!("Reports saved to {}", summary.reports_path.display()));
        }
    }

    Ok(())
}
