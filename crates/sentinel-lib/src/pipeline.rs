//! One batch run: load → detect → cap → advise → format → emit → persist
//!
//! The run is a single synchronous pass. Any stage error aborts it; artifacts
//! are only written after detection succeeded, and nothing already written
//! is rolled back by a later failure.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::advisor;
use crate::anomaly::{Detection, Detector};
use crate::config::RunConfig;
use crate::error::Result;
use crate::models::{AnomalyEvent, AnomalyRecord, AnomalyResult, MetricRow};
use crate::observability::{RunMetrics, StructuredLogger};
use crate::report::{format_event, join_reports};
use crate::source::open_source;

/// Table of the selected anomaly rows
pub const ANOMALIES_FILE: &str = "last_anomalies.csv";

/// Concatenated formatted reports
pub const REPORTS_FILE: &str = "last_reports.txt";

/// Receives each formatted report as it is produced
pub trait Notifier {
    fn notify(&mut self, report: &str);
}

/// Prints reports to stdout, one blank line apart
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, report: &str) {
        println!("{}\n", report);
    }
}

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub rows_loaded: usize,
    pub anomalies_detected: usize,
    pub alerts_emitted: usize,
    pub events: Vec<AnomalyEvent>,
    pub reports: Vec<String>,
    pub anomalies_path: PathBuf,
    pub reports_path: PathBuf,
}

/// A configured batch run writing into an explicit output directory
pub struct BatchRun {
    config: RunConfig,
    output_dir: PathBuf,
    notifier: Box<dyn Notifier>,
    logger: StructuredLogger,
    metrics: RunMetrics,
}

impl BatchRun {
    pub fn new(config: RunConfig, output_dir: impl Into<PathBuf>) -> Self {
        let run_id = format!("run-{}", chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"));
        Self {
            config,
            output_dir: output_dir.into(),
            notifier: Box::new(ConsoleNotifier),
            logger: StructuredLogger::new(run_id),
            metrics: RunMetrics::new(),
        }
    }

    /// Replace the console notifier
    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.logger = StructuredLogger::new(run_id);
        self
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Execute the run
    ///
    /// A failed run leaves the output directory untouched. The metrics
    /// textfile, when configured, is written either way so the failure is
    /// visible to the textfile collector.
    pub fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        let outcome = self.execute();

        match &outcome {
            Ok(summary) => {
                self.metrics.finish(true);
                self.logger
                    .log_run_finished(summary.alerts_emitted, started.elapsed().as_secs_f64());
            }
            Err(err) => {
                self.metrics.finish(false);
                self.logger.log_run_failed("run", &err.to_string());
            }
        }

        if let Some(path) = &self.config.runtime.metrics_textfile {
            if let Err(err) = self.metrics.write_textfile(path) {
                tracing::warn!(path = %path.display(), error = %err, "Failed to write metrics textfile");
            }
        }

        outcome
    }

    fn execute(&mut self) -> Result<RunSummary> {
        let source = open_source(&self.config.source)?;
        let detector = Detector::from_spec(&self.config.detection)?;
        self.logger
            .log_run_started(&source.describe(), detector.method_name());

        let batch = source.load()?;
        let nodes: HashSet<&str> = batch.rows().iter().map(|r| r.node.as_str()).collect();
        self.logger.log_batch_loaded(batch.len(), nodes.len());
        self.metrics.set_rows_loaded(batch.len());

        let detect_started = Instant::now();
        let detection = detector.detect(&batch)?;
        let detect_secs = detect_started.elapsed().as_secs_f64();
        self.metrics.observe_detection_duration(detect_secs);

        let anomalies = detection.anomalies();
        self.metrics.set_anomalies_detected(anomalies.len());
        self.logger.log_detection_complete(
            detector.method_name(),
            anomalies.len(),
            detection.threshold,
            detect_secs,
        );

        let limit = self.config.runtime.limit_alerts;
        let skip = anomalies.len().saturating_sub(limit);
        if skip > 0 {
            self.logger.log_alerts_capped(anomalies.len(), limit);
        }

        let anomaly_rows: Vec<MetricRow> = anomalies.iter().map(|r| r.row.clone()).collect();
        let mut events = Vec::new();
        let mut reports = Vec::new();
        for (k, result) in anomalies.iter().enumerate().skip(skip) {
            let history = self
                .config
                .runtime
                .escalate_recurring
                .then(|| &anomaly_rows[..k]);
            let (event, report) = self.report_one(&detection, result, history);
            if self.config.notifier.print {
                self.notifier.notify(&report);
            }
            events.push(event);
            reports.push(report);
        }
        self.metrics.set_alerts_emitted(reports.len());

        let selected: Vec<&AnomalyResult> = anomalies[skip..].to_vec();
        let (anomalies_path, reports_path) =
            self.write_artifacts(&selected, detector.metric_name(), &reports)?;

        Ok(RunSummary {
            rows_loaded: batch.len(),
            anomalies_detected: anomalies.len(),
            alerts_emitted: reports.len(),
            events,
            reports,
            anomalies_path,
            reports_path,
        })
    }

    fn report_one(
        &self,
        detection: &Detection,
        result: &AnomalyResult,
        history: Option<&[MetricRow]>,
    ) -> (AnomalyEvent, String) {
        let row = &result.row;
        let advice = advisor::assess(row, history);
        let (metric, value) = detection.representative(row);

        self.logger
            .log_anomaly(&row.node, &metric, value, advice.severity, advice.rule);

        let event = AnomalyEvent {
            timestamp: Some(row.timestamp.into()),
            node: Some(row.node.clone()).filter(|n| !n.is_empty()),
            metric: Some(metric),
            value: value.map(round2),
            threshold: Some(detection.threshold),
            suggestion: Some(advice.text),
        };
        let report = format_event(&event);
        (event, report)
    }

    fn write_artifacts(
        &self,
        selected: &[&AnomalyResult],
        metric: &str,
        reports: &[String],
    ) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(&self.output_dir)?;

        let anomalies_path = self.output_dir.join(ANOMALIES_FILE);
        let mut writer = csv::Writer::from_path(&anomalies_path)?;
        if selected.is_empty() {
            writer.write_record([
                "timestamp",
                "node",
                "cpu",
                "memory",
                "latency_ms",
                "zscore",
                "is_anomaly",
                "metric",
            ])?;
        }
        for result in selected {
            writer.serialize(AnomalyRecord::new(result, metric))?;
        }
        writer.flush()?;

        let reports_path = self.output_dir.join(REPORTS_FILE);
        std::fs::write(&reports_path, join_reports(reports))?;

        self.logger
            .log_artifacts_written(&anomalies_path, &reports_path, reports.len());
        Ok((anomalies_path, reports_path))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
