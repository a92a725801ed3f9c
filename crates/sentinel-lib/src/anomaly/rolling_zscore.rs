//! Rolling z-score detection
//!
//! Scores each value against the mean and population standard deviation of
//! the trailing `window` values of the same column, the value itself
//! included. Rows before the window fills get no score (cold start).

use std::collections::VecDeque;

use crate::error::{Result, SentinelError};
use crate::models::{AnomalyResult, MetricBatch, MetricColumn};

/// Smallest window with a meaningful standard deviation
pub const MIN_WINDOW: usize = 2;

/// Flags values whose rolling z-score magnitude reaches a threshold
#[derive(Debug, Clone)]
pub struct RollingZScore {
    /// Number of trailing values in each window
    pub window: usize,
    /// Absolute z-score at or above which a value is anomalous
    pub threshold: f64,
}

impl RollingZScore {
    pub fn new(window: usize, threshold: f64) -> Result<Self> {
        if window < MIN_WINDOW {
            return Err(SentinelError::InvalidParameter(format!(
                "rolling window must be at least {}, got {}",
                MIN_WINDOW, window
            )));
        }
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(SentinelError::InvalidParameter(format!(
                "z-score threshold must be positive, got {}",
                threshold
            )));
        }
        Ok(Self { window, threshold })
    }

    /// Score one column of the batch
    pub fn detect(&self, batch: &MetricBatch, column: MetricColumn) -> Vec<AnomalyResult> {
        let values = batch.column(column);
        let scores = self.score_series(&values);

        batch
            .rows()
            .iter()
            .zip(scores)
            .map(|(row, score)| AnomalyResult {
                row: row.clone(),
                is_anomaly: self.is_anomalous(score),
                score,
            })
            .collect()
    }

    /// Rolling z-scores for a series; `None` where undefined
    pub fn score_series(&self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        let mut stats = RollingStats::new(self.window);
        values
            .iter()
            .map(|value| {
                stats.push(*value);
                value.and_then(|v| stats.z_score(v))
            })
            .collect()
    }

    fn is_anomalous(&self, score: Option<f64>) -> bool {
        score.map(|z| z.abs() >= self.threshold).unwrap_or(false)
    }
}

/// Count-based rolling window statistics
///
/// A window holding any missing value has no statistics.
#[derive(Debug, Clone)]
pub struct RollingStats {
    /// Mean of the current window
    pub mean: f64,
    /// Population standard deviation of the current window
    pub std_dev: f64,
    samples: VecDeque<Option<f64>>,
    capacity: usize,
    constant: bool,
    complete: bool,
}

impl RollingStats {
    pub fn new(capacity: usize) -> Self {
        Self {
            mean: 0.0,
            std_dev: 0.0,
            samples: VecDeque::with_capacity(capacity),
            capacity,
            constant: false,
            complete: false,
        }
    }

    /// Add a sample, evicting the oldest once the window is full
    pub fn push(&mut self, value: Option<f64>) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.recalculate();
    }

    fn recalculate(&mut self) {
        self.complete = self.samples.len() == self.capacity
            && self.samples.iter().all(|v| v.is_some());
        if !self.complete {
            self.mean = 0.0;
            self.std_dev = 0.0;
            self.constant = false;
            return;
        }

        let values: Vec<f64> = self.samples.iter().flatten().copied().collect();
        let n = values.len() as f64;
        self.mean = values.iter().sum::<f64>() / n;

        // Two-pass population variance
        let variance = values.iter().map(|v| (v - self.mean).powi(2)).sum::<f64>() / n;
        self.std_dev = variance.sqrt();

        let first = values[0];
        self.constant = values.iter().all(|v| *v == first);
    }

    /// True once the window is full and has no missing values
    pub fn is_ready(&self) -> bool {
        self.complete
    }

    /// Z-score of `value` against the window; `None` when undefined
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if !self.complete || self.constant || self.std_dev == 0.0 {
            return None;
        }
        Some((value - self.mean) / self.std_dev)
    }
}
