//! Run configuration
//!
//! A flat key-value structure read from a YAML, TOML or JSON file and
//! overlaid with `SENTINEL__SECTION__KEY` environment variables.

use crate::error::{Result, SentinelError};
use crate::models::MetricColumn;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Full configuration for one batch run
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    pub source: SourceSpec,
    #[serde(default)]
    pub detection: DetectionSpec,
    #[serde(default)]
    pub notifier: NotifierSpec,
    #[serde(default)]
    pub runtime: RuntimeSpec,
}

/// Where metrics come from
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    /// Source kind; only `csv` is implemented
    pub kind: String,
    /// Path of the flat file for `csv` sources
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Detector strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    RollingZscore,
    IsolationForest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionSpec {
    #[serde(default = "default_method")]
    pub method: DetectionMethod,

    /// Column scored by the rolling z-score strategy
    #[serde(default = "default_column")]
    pub column: MetricColumn,

    #[serde(default = "default_rolling_window")]
    pub rolling_window: usize,

    #[serde(default = "default_zscore_threshold")]
    pub zscore_threshold: f64,

    /// Expected fraction of anomalies for the outlier model
    #[serde(default = "default_contamination")]
    pub contamination: f64,

    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifierSpec {
    /// Print each formatted report to stdout
    #[serde(default = "default_print")]
    pub print: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeSpec {
    /// Keep only the chronologically last N anomalies
    #[serde(default = "default_limit_alerts")]
    pub limit_alerts: usize,

    /// Append the recurring-anomaly note when a node keeps misbehaving
    #[serde(default = "default_escalate_recurring")]
    pub escalate_recurring: bool,

    /// Prometheus text exposition written at the end of the run
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

fn default_method() -> DetectionMethod {
    DetectionMethod::RollingZscore
}

fn default_column() -> MetricColumn {
    MetricColumn::Cpu
}

fn default_rolling_window() -> usize {
    20
}

fn default_zscore_threshold() -> f64 {
    3.0
}

fn default_contamination() -> f64 {
    0.02
}

fn default_n_estimators() -> usize {
    200
}

fn default_seed() -> u64 {
    42
}

fn default_print() -> bool {
    true
}

fn default_limit_alerts() -> usize {
    10
}

fn default_escalate_recurring() -> bool {
    true
}

impl Default for DetectionSpec {
    fn default() -> Self {
        Self {
            method: default_method(),
            column: default_column(),
            rolling_window: default_rolling_window(),
            zscore_threshold: default_zscore_threshold(),
            contamination: default_contamination(),
            n_estimators: default_n_estimators(),
            seed: default_seed(),
        }
    }
}

impl Default for NotifierSpec {
    fn default() -> Self {
        Self {
            print: default_print(),
        }
    }
}

impl Default for RuntimeSpec {
    fn default() -> Self {
        Self {
            limit_alerts: default_limit_alerts(),
            escalate_recurring: default_escalate_recurring(),
            metrics_textfile: None,
        }
    }
}

impl RunConfig {
    /// Load configuration from a file and `SENTINEL__*` environment variables
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SentinelError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Parse configuration from an in-memory document
    pub fn from_str_with_format(contents: &str, format: config::FileFormat) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(contents, format))
            .build()?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> Result<Self> {
        let run: RunConfig = config.try_deserialize()?;
        run.validate()?;
        Ok(run)
    }

    /// Reject values no detector or writer can work with
    pub fn validate(&self) -> Result<()> {
        if self.source.kind.trim().is_empty() {
            return Err(SentinelError::Config("source.kind must not be empty".into()));
        }
        if self.source.kind == "csv" && self.source.path.is_none() {
            return Err(SentinelError::Config(
                "source.path is required for csv sources".into(),
            ));
        }

        let det = &self.detection;
        if det.rolling_window < 2 {
            return Err(SentinelError::Config(format!(
                "detection.rolling_window must be at least 2, got {}",
                det.rolling_window
            )));
        }
        if !det.zscore_threshold.is_finite() || det.zscore_threshold <= 0.0 {
            return Err(SentinelError::Config(format!(
                "detection.zscore_threshold must be positive, got {}",
                det.zscore_threshold
            )));
        }
        if !(det.contamination > 0.0 && det.contamination <= 0.5) {
            return Err(SentinelError::Config(format!(
                "detection.contamination must be in (0, 0.5], got {}",
                det.contamination
            )));
        }
        if det.n_estimators == 0 {
            return Err(SentinelError::Config(
                "detection.n_estimators must be positive".into(),
            ));
        }

        if self.runtime.limit_alerts == 0 {
            return Err(SentinelError::Config(
                "runtime.limit_alerts must be positive".into(),
            ));
        }

        Ok(())
    }
}
