//! Observability for batch runs
//!
//! Provides:
//! - Run metrics in a private Prometheus registry, exportable as a textfile
//!   for the node_exporter textfile collector
//! - Structured logging of run events with tracing

use prometheus::{Encoder, Gauge, Histogram, HistogramOpts, IntGauge, Registry, TextEncoder};
use std::path::Path;
use tracing::{error, info, warn};

use crate::advisor::Severity;
use crate::error::Result;

/// Histogram buckets for detection latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0];

/// Metrics describing one batch run
#[derive(Clone)]
pub struct RunMetrics {
    registry: Registry,
    rows_loaded: IntGauge,
    anomalies_detected: IntGauge,
    alerts_emitted: IntGauge,
    detection_duration_seconds: Histogram,
    last_run_success: Gauge,
    last_run_timestamp_seconds: Gauge,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let rows_loaded = IntGauge::new("sentinel_rows_loaded", "Metric rows loaded in the last run")
            .expect("valid rows_loaded metric");
        let anomalies_detected = IntGauge::new(
            "sentinel_anomalies_detected",
            "Rows flagged anomalous in the last run",
        )
        .expect("valid anomalies_detected metric");
        let alerts_emitted = IntGauge::new(
            "sentinel_alerts_emitted",
            "Reports emitted after the alert limit in the last run",
        )
        .expect("valid alerts_emitted metric");
        let detection_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "sentinel_detection_duration_seconds",
                "Time spent in the detector",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )
        .expect("valid detection_duration_seconds metric");
        let last_run_success = Gauge::new(
            "sentinel_last_run_success",
            "1 if the last run completed, 0 if it failed",
        )
        .expect("valid last_run_success metric");
        let last_run_timestamp_seconds = Gauge::new(
            "sentinel_last_run_timestamp_seconds",
            "Unix time at which the last run finished",
        )
        .expect("valid last_run_timestamp_seconds metric");

        for collector in [
            Box::new(rows_loaded.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(anomalies_detected.clone()),
            Box::new(alerts_emitted.clone()),
            Box::new(detection_duration_seconds.clone()),
            Box::new(last_run_success.clone()),
            Box::new(last_run_timestamp_seconds.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric names are unique within the run registry");
        }

        Self {
            registry,
            rows_loaded,
            anomalies_detected,
            alerts_emitted,
            detection_duration_seconds,
            last_run_success,
            last_run_timestamp_seconds,
        }
    }

    pub fn set_rows_loaded(&self, rows: usize) {
        self.rows_loaded.set(rows as i64);
    }

    pub fn set_anomalies_detected(&self, count: usize) {
        self.anomalies_detected.set(count as i64);
    }

    pub fn set_alerts_emitted(&self, count: usize) {
        self.alerts_emitted.set(count as i64);
    }

    pub fn observe_detection_duration(&self, duration_secs: f64) {
        self.detection_duration_seconds.observe(duration_secs);
    }

    /// Mark the end of the run
    pub fn finish(&self, success: bool) {
        self.last_run_success.set(if success { 1.0 } else { 0.0 });
        self.last_run_timestamp_seconds
            .set(chrono::Utc::now().timestamp() as f64);
    }

    /// Render the text exposition format
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }

    /// Write the exposition to `path` through a temporary sibling file
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render())?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Structured logger for run events
///
/// Provides consistent field names for loads, detections, anomalies and
/// artifact writes.
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Log run start
    pub fn log_run_started(&self, source: &str, method: &str) {
        info!(
            event = "run_started",
            run_id = %self.run_id,
            source = %source,
            method = %method,
            "Batch run started"
        );
    }

    /// Log a loaded batch
    pub fn log_batch_loaded(&self, rows: usize, nodes: usize) {
        info!(
            event = "batch_loaded",
            run_id = %self.run_id,
            rows = rows,
            nodes = nodes,
            "Metric batch loaded"
        );
    }

    /// Log detector completion
    pub fn log_detection_complete(
        &self,
        method: &str,
        anomalies: usize,
        threshold: f64,
        duration_secs: f64,
    ) {
        info!(
            event = "detection_complete",
            run_id = %self.run_id,
            method = %method,
            anomalies = anomalies,
            threshold = threshold,
            duration_secs = duration_secs,
            "Detection finished"
        );
    }

    /// Log one reported anomaly
    pub fn log_anomaly(&self, node: &str, metric: &str, value: Option<f64>, severity: Severity, rule: &str) {
        match severity {
            Severity::Critical => {
                warn!(
                    event = "anomaly_reported",
                    run_id = %self.run_id,
                    node = %node,
                    metric = %metric,
                    value = ?value,
                    severity = %severity,
                    rule = %rule,
                    "Critical anomaly reported"
                );
            }
            _ => {
                info!(
                    event = "anomaly_reported",
                    run_id = %self.run_id,
                    node = %node,
                    metric = %metric,
                    value = ?value,
                    severity = %severity,
                    rule = %rule,
                    "Anomaly reported"
                );
            }
        }
    }

    /// Log dropped anomalies beyond the alert limit
    pub fn log_alerts_capped(&self, detected: usize, limit: usize) {
        info!(
            event = "alerts_capped",
            run_id = %self.run_id,
            detected = detected,
            limit = limit,
            "Older anomalies dropped by alert limit"
        );
    }

    /// Log written artifacts
    pub fn log_artifacts_written(&self, anomalies_path: &Path, reports_path: &Path, reports: usize) {
        info!(
            event = "artifacts_written",
            run_id = %self.run_id,
            anomalies_path = %anomalies_path.display(),
            reports_path = %reports_path.display(),
            reports = reports,
            "Run artifacts written"
        );
    }

    /// Log a fatal run error
    pub fn log_run_failed(&self, stage: &str, reason: &str) {
        error!(
            event = "run_failed",
            run_id = %self.run_id,
            stage = %stage,
            reason = %reason,
            "Batch run failed"
        );
    }

    /// Log run completion
    pub fn log_run_finished(&self, alerts: usize, duration_secs: f64) {
        info!(
            event = "run_finished",
            run_id = %self.run_id,
            alerts = alerts,
            duration_secs = duration_secs,
            "Batch run finished"
        );
    }
}
