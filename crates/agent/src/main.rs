//! Sentinel agent - one batch anomaly run per invocation
//!
//! Meant to be scheduled (cron, systemd timer, CronJob). Reads the run
//! configuration, detects anomalies, prints incident reports and persists
//! the anomaly table and report text into the output directory.

use anyhow::{Context, Result};
use sentinel_lib::{BatchRun, RunConfig};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!(version = AGENT_VERSION, "Starting sentinel-agent");

    let agent = config::AgentConfig::load()?;
    info!(
        config_path = %agent.config_path.display(),
        output_dir = %agent.output_dir.display(),
        "Agent configured"
    );

    let run_config = RunConfig::load(&agent.config_path)
        .with_context(|| format!("loading {}", agent.config_path.display()))?;

    let summary = BatchRun::new(run_config, &agent.output_dir)
        .run()
        .context("batch run failed")?;

    info!(
        rows = summary.rows_loaded,
        anomalies = summary.anomalies_detected,
        alerts = summary.alerts_emitted,
        anomalies_path = %summary.anomalies_path.display(),
        reports_path = %summary.reports_path.display(),
        "Run complete"
    );

    Ok(())
}
