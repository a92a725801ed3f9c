//! Metric sources
//!
//! A source loads one bounded batch of metric rows, sorted ascending by
//! timestamp. Only the flat-file (CSV) source is implemented; any other
//! configured kind fails loudly when the source is opened.

mod csv_file;

pub use csv_file::{parse_timestamp, CsvFileSource, REQUIRED_COLUMNS};

use crate::config::SourceSpec;
use crate::error::{Result, SentinelError};
use crate::models::MetricBatch;

/// Trait for metric batch loaders
pub trait MetricSource {
    /// Load the full batch for this run
    fn load(&self) -> Result<MetricBatch>;

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Create the source named by the configuration
pub fn open_source(spec: &SourceSpec) -> Result<Box<dyn MetricSource>> {
    match spec.kind.as_str() {
        "csv" => {
            let path = spec.path.as_ref().ok_or_else(|| {
                SentinelError::Config("source.path is required for csv sources".into())
            })?;
            tracing::debug!(path = %path.display(), "Using flat-file metric source");
            Ok(Box::new(CsvFileSource::new(path)))
        }
        other => Err(SentinelError::UnsupportedSourceKind(other.to_string())),
    }
}
