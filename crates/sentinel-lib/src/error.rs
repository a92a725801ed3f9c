//! Error taxonomy for a batch run
//!
//! Every variant is fatal to the run that raised it; nothing here is retried.

use thiserror::Error;

/// Errors raised while loading, detecting or writing run artifacts
#[derive(Debug, Error)]
pub enum SentinelError {
    /// Missing or invalid configuration keys
    #[error("configuration error: {0}")]
    Config(String),

    /// A metric source kind other than the flat-file source
    #[error("source kind '{0}' is not implemented (only 'csv' is supported)")]
    UnsupportedSourceKind(String),

    /// Malformed timestamp, unparsable value or missing required column
    #[error("data error: {0}")]
    Data(String),

    /// The outlier model cannot be fit on the given feature matrix
    #[error("model fit error: {0}")]
    ModelFit(String),

    /// Detector parameter rejected before any work was done
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl From<config::ConfigError> for SentinelError {
    fn from(err: config::ConfigError) -> Self {
        SentinelError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SentinelError>;
