//! Synthetic data command

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use std::path::Path;

use sentinel_lib::simulator::{simulate_series, write_csv, SimulationParams};

use crate::output::{print_success, OutputFormat};

/// Write a synthetic metric CSV
pub fn simulate(
    output: &Path,
    periods: usize,
    interval_secs: i64,
    spikes: usize,
    seed: Option<u64>,
    format: OutputFormat,
) -> Result<()> {
    if periods == 0 {
        bail!("--periods must be positive");
    }
    if interval_secs <= 0 {
        bail!("--interval-secs must be positive");
    }

    let interval = Duration::seconds(interval_secs);
    let params = SimulationParams {
        start: Utc::now() - interval * periods as i32,
        periods,
        interval,
        spikes,
        ..SimulationParams::default()
    };

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let rows = simulate_series(&params, &mut rng);
    write_csv(&rows, output).with_context(|| format!("Failed to write {}", output.display()))?;

    match format {
        OutputFormat::Json => {
            let summary = json!({
                "path": output,
                "rows": rows.len(),
                "spikes": spikes.min(periods),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Table => {
            print_success(&format!(
                "Wrote {} rows to {}",
                rows.len(),
                output.display()
            ));
        }
    }

    Ok(())
}
