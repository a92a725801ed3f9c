//! Flat-file (CSV) metric source

use super::MetricSource;
use crate::error::{Result, SentinelError};
use crate::models::{MetricBatch, MetricRow};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Columns every input file must carry
pub const REQUIRED_COLUMNS: [&str; 5] = ["timestamp", "node", "cpu", "memory", "latency_ms"];

/// Naive layouts accepted besides RFC 3339; read as UTC
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Offset-carrying layout written by spreadsheet and dataframe exports
const OFFSET_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Loads metric rows from a CSV file with a header line
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse rows from any reader; rows need not be pre-sorted
    pub fn read_batch<R: Read>(reader: R) -> Result<MetricBatch> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let mut index = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, column) in index.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| {
                    SentinelError::Data(format!("missing required column '{}'", column))
                })?;
        }
        let [ts_idx, node_idx, cpu_idx, mem_idx, lat_idx] = index;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let field = |idx: usize| record.get(idx).unwrap_or("");

            let timestamp = parse_timestamp(field(ts_idx)).map_err(|e| {
                SentinelError::Data(format!("line {}: {}", line, e))
            })?;

            rows.push(MetricRow {
                timestamp,
                node: field(node_idx).to_string(),
                cpu: parse_value(field(cpu_idx), "cpu", line)?,
                memory: parse_value(field(mem_idx), "memory", line)?,
                latency_ms: parse_value(field(lat_idx), "latency_ms", line)?,
            });
        }

        Ok(MetricBatch::from_rows(rows))
    }
}

impl MetricSource for CsvFileSource {
    fn load(&self) -> Result<MetricBatch> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            SentinelError::Data(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        let batch = Self::read_batch(file)?;
        debug!(path = %self.path.display(), rows = batch.len(), "Loaded metric file");
        Ok(batch)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Parse a timestamp cell into a UTC instant
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, OFFSET_FORMAT) {
        return Ok(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| SentinelError::Data(format!("invalid timestamp '{}'", raw)))
}

fn parse_value(raw: &str, column: &str, line: u64) -> Result<Option<f64>> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let invalid = || {
        SentinelError::Data(format!(
            "line {}: invalid {} value '{}'",
            line, column, raw
        ))
    };
    let value = raw.parse::<f64>().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(Some(value))
}
