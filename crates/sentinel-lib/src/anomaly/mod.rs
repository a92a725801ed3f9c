//! Anomaly detection over a metric batch
//!
//! Two strategies sit behind one `detect` call:
//! - Rolling z-score on a single column (cold-start aware, deterministic)
//! - Isolation forest over several columns (batch-trained, seeded)

mod isolation_forest;
mod rolling_zscore;

pub use isolation_forest::{
    average_path_length, fill_features, FittedForest, IsolationForest, MAX_SAMPLES,
};
pub use rolling_zscore::{RollingStats, RollingZScore, MIN_WINDOW};

use crate::config::{DetectionMethod, DetectionSpec};
use crate::error::Result;
use crate::models::{AnomalyResult, MetricBatch, MetricColumn, MetricRow};

/// Metric tag for anomalies found by the multivariate strategy
pub const COMPOSITE_METRIC: &str = "composite";

/// Detector strategy, selected by configuration
#[derive(Debug, Clone)]
pub enum Detector {
    RollingZScore {
        detector: RollingZScore,
        column: MetricColumn,
    },
    MultivariateOutlier {
        forest: IsolationForest,
        columns: Vec<MetricColumn>,
    },
}

impl Detector {
    pub fn from_spec(spec: &DetectionSpec) -> Result<Self> {
        match spec.method {
            DetectionMethod::RollingZscore => Ok(Detector::RollingZScore {
                detector: RollingZScore::new(spec.rolling_window, spec.zscore_threshold)?,
                column: spec.column,
            }),
            DetectionMethod::IsolationForest => Ok(Detector::MultivariateOutlier {
                forest: IsolationForest::new(spec.n_estimators, spec.contamination, spec.seed)?,
                columns: MetricColumn::ALL.to_vec(),
            }),
        }
    }

    /// Strategy name as used in configuration
    pub fn method_name(&self) -> &'static str {
        match self {
            Detector::RollingZScore { .. } => "rolling_zscore",
            Detector::MultivariateOutlier { .. } => "isolation_forest",
        }
    }

    /// Metric tag attached to every anomaly this detector reports
    pub fn metric_name(&self) -> &'static str {
        match self {
            Detector::RollingZScore { column, .. } => column.name(),
            Detector::MultivariateOutlier { .. } => COMPOSITE_METRIC,
        }
    }

    /// Score every row of the batch
    pub fn detect(&self, batch: &MetricBatch) -> Result<Detection> {
        match self {
            Detector::RollingZScore { detector, column } => Ok(Detection {
                results: detector.detect(batch, *column),
                threshold: detector.threshold,
                attribution: Attribution::Column(*column),
            }),
            Detector::MultivariateOutlier { forest, columns } => {
                let matrix = fill_features(batch, columns)?;
                let fitted = forest.fit(&matrix)?;
                Ok(Detection {
                    results: fitted.classify(batch, &matrix),
                    threshold: fitted.threshold,
                    attribution: Attribution::Composite(FeatureStats::from_matrix(columns, &matrix)),
                })
            }
        }
    }
}

/// Outcome of one detector pass
#[derive(Debug, Clone)]
pub struct Detection {
    /// One result per batch row, in batch order
    pub results: Vec<AnomalyResult>,
    /// Z-score threshold, or the calibrated forest score threshold
    pub threshold: f64,
    attribution: Attribution,
}

#[derive(Debug, Clone)]
enum Attribution {
    Column(MetricColumn),
    Composite(Vec<FeatureStats>),
}

/// Batch-wide mean and spread of one feature
#[derive(Debug, Clone)]
pub struct FeatureStats {
    pub column: MetricColumn,
    pub mean: f64,
    pub std_dev: f64,
}

impl FeatureStats {
    fn from_matrix(columns: &[MetricColumn], matrix: &[Vec<f64>]) -> Vec<Self> {
        let n = matrix.len() as f64;
        columns
            .iter()
            .enumerate()
            .map(|(f, column)| {
                let mean = matrix.iter().map(|r| r[f]).sum::<f64>() / n;
                let variance = matrix.iter().map(|r| (r[f] - mean).powi(2)).sum::<f64>() / n;
                FeatureStats {
                    column: *column,
                    mean,
                    std_dev: variance.sqrt(),
                }
            })
            .collect()
    }

    fn deviation(&self, value: f64) -> f64 {
        if self.std_dev < f64::EPSILON {
            return 0.0;
        }
        ((value - self.mean) / self.std_dev).abs()
    }
}

impl Detection {
    /// Rows flagged anomalous, in chronological order
    pub fn anomalies(&self) -> Vec<&AnomalyResult> {
        self.results.iter().filter(|r| r.is_anomaly).collect()
    }

    /// Metric label and value that best represent an anomalous row
    ///
    /// Single-column detection reports the scored column. Composite
    /// detection reports the feature that deviates most from its batch
    /// mean, labelled `composite:<feature>`.
    pub fn representative(&self, row: &MetricRow) -> (String, Option<f64>) {
        match &self.attribution {
            Attribution::Column(column) => (column.name().to_string(), column.value(row)),
            Attribution::Composite(stats) => {
                let driver = stats
                    .iter()
                    .filter_map(|s| s.column.value(row).map(|v| (s, v, s.deviation(v))))
                    .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal));
                match driver {
                    Some((s, value, _)) => {
                        (format!("{}:{}", COMPOSITE_METRIC, s.column), Some(value))
                    }
                    None => (COMPOSITE_METRIC.to_string(), None),
                }
            }
        }
    }
}
