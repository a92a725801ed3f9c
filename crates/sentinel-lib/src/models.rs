//! Core data models for a batch run

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric metric columns carried by every row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricColumn {
    Cpu,
    Memory,
    LatencyMs,
}

impl MetricColumn {
    pub const ALL: [MetricColumn; 3] = [
        MetricColumn::Cpu,
        MetricColumn::Memory,
        MetricColumn::LatencyMs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MetricColumn::Cpu => "cpu",
            MetricColumn::Memory => "memory",
            MetricColumn::LatencyMs => "latency_ms",
        }
    }

    /// Read this column from a row
    pub fn value(&self, row: &MetricRow) -> Option<f64> {
        match self {
            MetricColumn::Cpu => row.cpu,
            MetricColumn::Memory => row.memory,
            MetricColumn::LatencyMs => row.latency_ms,
        }
    }
}

impl fmt::Display for MetricColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One timestamped sample for one node
///
/// Empty cells in the source file load as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub timestamp: DateTime<Utc>,
    pub node: String,
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub latency_ms: Option<f64>,
}

impl MetricRow {
    pub fn new(
        timestamp: DateTime<Utc>,
        node: impl Into<String>,
        cpu: f64,
        memory: f64,
        latency_ms: f64,
    ) -> Self {
        Self {
            timestamp,
            node: node.into(),
            cpu: Some(cpu),
            memory: Some(memory),
            latency_ms: Some(latency_ms),
        }
    }
}

/// Rows ordered by non-decreasing timestamp
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricBatch {
    rows: Vec<MetricRow>,
}

impl MetricBatch {
    /// Build a batch, stable-sorting rows by timestamp
    pub fn from_rows(mut rows: Vec<MetricRow>) -> Self {
        rows.sort_by_key(|r| r.timestamp);
        Self { rows }
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one column in row order
    pub fn column(&self, column: MetricColumn) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| column.value(r)).collect()
    }
}

/// A row after detection
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyResult {
    pub row: MetricRow,
    /// Detector-specific score; `None` where no score could be computed
    pub score: Option<f64>,
    pub is_anomaly: bool,
}

/// Anomalies of a single node, used to detect recurrence
#[derive(Debug, Clone)]
pub struct NodeHistory<'a> {
    node: &'a str,
    rows: Vec<&'a MetricRow>,
}

/// More than this many anomalies on one node escalates the suggestion
pub const RECURRENCE_LIMIT: usize = 3;

impl<'a> NodeHistory<'a> {
    /// Restrict `anomalies` to the rows of `node`
    pub fn of(node: &'a str, anomalies: &'a [MetricRow]) -> Self {
        Self {
            node,
            rows: anomalies.iter().filter(|r| r.node == node).collect(),
        }
    }

    pub fn node(&self) -> &str {
        self.node
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_recurring(&self) -> bool {
        self.rows.len() > RECURRENCE_LIMIT
    }
}

/// Timestamp of an event, either a parsed instant or an opaque string
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventTime {
    Instant(DateTime<Utc>),
    Raw(String),
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Instant(ts) => {
                f.write_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, false))
            }
            EventTime::Raw(raw) => f.write_str(raw),
        }
    }
}

impl From<DateTime<Utc>> for EventTime {
    fn from(ts: DateTime<Utc>) -> Self {
        EventTime::Instant(ts)
    }
}

/// The unit handed to the report formatter
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyEvent {
    pub timestamp: Option<EventTime>,
    pub node: Option<String>,
    pub metric: Option<String>,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub suggestion: Option<String>,
}

/// One line of the saved anomaly table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub timestamp: String,
    pub node: String,
    pub cpu: Option<f64>,
    pub memory: Option<f64>,
    pub latency_ms: Option<f64>,
    pub zscore: Option<f64>,
    pub is_anomaly: bool,
    pub metric: String,
}

impl AnomalyRecord {
    pub fn new(result: &AnomalyResult, metric: impl Into<String>) -> Self {
        Self {
            timestamp: result
                .row
                .timestamp
                .to_rfc3339_opts(SecondsFormat::AutoSi, false),
            node: result.row.node.clone(),
            cpu: result.row.cpu,
            memory: result.row.memory,
            latency_ms: result.row.latency_ms,
            zscore: result.score,
            is_anomaly: result.is_anomaly,
            metric: metric.into(),
        }
    }
}
