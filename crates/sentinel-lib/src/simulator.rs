//! Synthetic metric series for demos and tests
//!
//! CPU follows a noisy sine around a base load with a few injected spikes;
//! memory and latency follow their own periodic patterns.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::f64::consts::PI;
use std::path::Path;

use crate::error::{Result, SentinelError};
use crate::models::MetricRow;

/// Node ids rows are spread across
pub const DEMO_NODES: [&str; 3] = ["node-a", "node-b", "node-c"];

/// Shape of a generated series
#[derive(Debug, Clone)]
pub struct SimulationParams {
    pub start: DateTime<Utc>,
    pub periods: usize,
    pub interval: Duration,
    /// Mean CPU load before noise and seasonality
    pub base_cpu: f64,
    /// Standard deviation of CPU noise
    pub cpu_noise: f64,
    /// Number of injected CPU spikes
    pub spikes: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            start: Utc::now() - Duration::minutes(300),
            periods: 900,
            interval: Duration::seconds(20),
            base_cpu: 35.0,
            cpu_noise: 6.0,
            spikes: 12,
        }
    }
}

/// Generate a time-ordered series of metric rows
pub fn simulate_series<R: Rng + ?Sized>(params: &SimulationParams, rng: &mut R) -> Vec<MetricRow> {
    let n = params.periods;
    let phase = |i: usize| {
        if n > 1 {
            4.0 * PI * i as f64 / (n - 1) as f64
        } else {
            0.0
        }
    };

    let mut cpu: Vec<f64> = (0..n)
        .map(|i| params.base_cpu + gaussian(rng, params.cpu_noise) + 8.0 * phase(i).sin())
        .collect();

    let spikes = params.spikes.min(n);
    for idx in rand::seq::index::sample(rng, n, spikes).into_iter() {
        cpu[idx] += rng.gen_range(35.0..60.0);
    }

    (0..n)
        .map(|i| {
            let x = phase(i);
            MetricRow::new(
                params.start + params.interval * i as i32,
                DEMO_NODES[rng.gen_range(0..DEMO_NODES.len())],
                cpu[i].clamp(0.0, 100.0),
                (40.0 + gaussian(rng, 6.0) + 6.0 * x.cos()).clamp(0.0, 100.0),
                (80.0 + 15.0 * (2.0 * x).sin() + gaussian(rng, 10.0)).clamp(10.0, 400.0),
            )
        })
        .collect()
}

/// Write rows as a metric CSV readable by the flat-file source
pub fn write_csv(rows: &[MetricRow], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(SentinelError::from)
}

/// Zero-mean normal sample via the Box-Muller transform
fn gaussian<R: Rng + ?Sized>(rng: &mut R, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}
