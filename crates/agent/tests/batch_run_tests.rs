//! End-to-end tests for one batch run over flat files

use chrono::{DateTime, Duration, TimeZone, Utc};
use sentinel_lib::advisor::RECURRING_NOTE;
use sentinel_lib::models::{AnomalyRecord, MetricRow};
use sentinel_lib::pipeline::{ANOMALIES_FILE, REPORTS_FILE};
use sentinel_lib::simulator::write_csv;
use sentinel_lib::{BatchRun, Notifier, RunConfig, SentinelError};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

/// Collects reports instead of printing them
#[derive(Clone, Default)]
struct CapturingNotifier {
    seen: Rc<RefCell<Vec<String>>>,
}

impl Notifier for CapturingNotifier {
    fn notify(&mut self, report: &str) {
        self.seen.borrow_mut().push(report.to_string());
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

/// Alternating 35/45 CPU on one node with 99% spikes at the given rows
fn spiky_rows(len: usize, spikes: &[usize]) -> Vec<MetricRow> {
    (0..len)
        .map(|i| {
            let cpu = if spikes.contains(&i) {
                99.0
            } else if i % 2 == 0 {
                35.0
            } else {
                45.0
            };
            MetricRow::new(start() + Duration::minutes(i as i64), "node-a", cpu, 50.0, 80.0)
        })
        .collect()
}

fn write_config(dir: &Path, body: &str) -> RunConfig {
    let path = dir.join("config.yaml");
    std::fs::write(&path, body).unwrap();
    RunConfig::load(&path).unwrap()
}

fn csv_config(dir: &Path, rows: &[MetricRow], extra: &str) -> RunConfig {
    let metrics = dir.join("metrics.csv");
    write_csv(rows, &metrics).unwrap();
    write_config(
        dir,
        &format!(
            "source:\n  kind: csv\n  path: {}\n{}",
            metrics.display(),
            extra
        ),
    )
}

fn read_records(path: &Path) -> Vec<AnomalyRecord> {
    csv::Reader::from_path(path)
        .unwrap()
        .deserialize::<AnomalyRecord>()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn test_single_spike_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = csv_config(dir.path(), &spiky_rows(25, &[24]), "");
    let out = dir.path().join("out");
    let notifier = CapturingNotifier::default();

    let summary = BatchRun::new(config, &out)
        .with_notifier(notifier.clone())
        .run()
        .unwrap();

    assert_eq!(summary.rows_loaded, 25);
    assert_eq!(summary.anomalies_detected, 1);
    assert_eq!(summary.alerts_emitted, 1);

    let report = &summary.reports[0];
    assert!(report.starts_with("🚨 Critical: CPU spike 99.0% on node-a."));
    assert!(report.contains("• Time: 2024-05-01T00:24:00+00:00"));
    assert!(report.contains("• Node: node-a"));
    assert!(report.contains("• Metric: cpu"));
    assert!(report.ends_with("• Value: 99.0"));
    assert!(!report.contains(RECURRING_NOTE));

    let event = &summary.events[0];
    assert_eq!(event.threshold, Some(3.0));

    let records = read_records(&out.join(ANOMALIES_FILE));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].timestamp, "2024-05-01T00:24:00+00:00");
    assert_eq!(records[0].metric, "cpu");
    assert!(records[0].is_anomaly);
    assert!(records[0].zscore.unwrap() > 4.0);

    let saved = std::fs::read_to_string(out.join(REPORTS_FILE)).unwrap();
    assert_eq!(saved, *report);
    assert_eq!(*notifier.seen.borrow(), summary.reports);
}

#[test]
fn test_alert_limit_keeps_latest() {
    let dir = TempDir::new().unwrap();
    let spikes: Vec<usize> = (0..15).map(|k| 24 + 20 * k).collect();
    let rows = spiky_rows(310, &spikes);
    let config = csv_config(dir.path(), &rows, "");
    let out = dir.path().join("out");

    let summary = BatchRun::new(config, &out)
        .with_notifier(CapturingNotifier::default())
        .run()
        .unwrap();

    assert_eq!(summary.anomalies_detected, 15);
    assert_eq!(summary.alerts_emitted, 10);

    let expected: Vec<String> = spikes[5..]
        .iter()
        .map(|&i| rows[i].timestamp.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, false))
        .collect();

    let records = read_records(&out.join(ANOMALIES_FILE));
    let saved: Vec<String> = records.iter().map(|r| r.timestamp.clone()).collect();
    assert_eq!(saved, expected);

    let text = std::fs::read_to_string(out.join(REPORTS_FILE)).unwrap();
    assert_eq!(text.matches("• Time:").count(), 10);
    assert!(text.contains(&format!("• Time: {}", expected[0])));
    assert!(!text.contains(&format!(
        "• Time: {}",
        rows[spikes[4]].timestamp.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, false)
    )));

    // Every kept anomaly has at least four earlier ones on node-a
    assert!(summary.reports.iter().all(|r| r.contains(RECURRING_NOTE)));
}

#[test]
fn test_escalation_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let spikes: Vec<usize> = (0..6).map(|k| 24 + 20 * k).collect();
    let config = csv_config(
        dir.path(),
        &spiky_rows(150, &spikes),
        "runtime:\n  escalate_recurring: false\n",
    );

    let summary = BatchRun::new(config, dir.path().join("out"))
        .with_notifier(CapturingNotifier::default())
        .run()
        .unwrap();

    assert_eq!(summary.alerts_emitted, 6);
    assert!(summary.reports.iter().all(|r| !r.contains(RECURRING_NOTE)));
}

#[test]
fn test_print_disabled_still_persists() {
    let dir = TempDir::new().unwrap();
    let config = csv_config(
        dir.path(),
        &spiky_rows(25, &[24]),
        "notifier:\n  print: false\n",
    );
    let out = dir.path().join("out");
    let notifier = CapturingNotifier::default();

    let summary = BatchRun::new(config, &out)
        .with_notifier(notifier.clone())
        .run()
        .unwrap();

    assert!(notifier.seen.borrow().is_empty());
    assert_eq!(summary.alerts_emitted, 1);
    assert!(out.join(ANOMALIES_FILE).is_file());
    assert!(!std::fs::read_to_string(out.join(REPORTS_FILE))
        .unwrap()
        .is_empty());
}

#[test]
fn test_quiet_batch_writes_empty_artifacts() {
    let dir = TempDir::new().unwrap();
    let config = csv_config(dir.path(), &spiky_rows(40, &[]), "");
    let out = dir.path().join("out");

    let summary = BatchRun::new(config, &out)
        .with_notifier(CapturingNotifier::default())
        .run()
        .unwrap();

    assert_eq!(summary.anomalies_detected, 0);
    let table = std::fs::read_to_string(out.join(ANOMALIES_FILE)).unwrap();
    assert_eq!(
        table.trim_end(),
        "timestamp,node,cpu,memory,latency_ms,zscore,is_anomaly,metric"
    );
    assert_eq!(std::fs::read_to_string(out.join(REPORTS_FILE)).unwrap(), "");
}

#[test]
fn test_unsupported_source_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "source:\n  kind: prometheus\n");
    let out = dir.path().join("out");

    let err = BatchRun::new(config, &out)
        .with_notifier(CapturingNotifier::default())
        .run()
        .unwrap_err();

    assert!(matches!(err, SentinelError::UnsupportedSourceKind(ref k) if k == "prometheus"));
    assert!(!out.exists());
}

#[test]
fn test_missing_input_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            "source:\n  kind: csv\n  path: {}\n",
            dir.path().join("absent.csv").display()
        ),
    );
    let out = dir.path().join("out");

    let err = BatchRun::new(config, &out).run().unwrap_err();
    assert!(matches!(err, SentinelError::Data(_)));
    assert!(!out.exists());
}

#[test]
fn test_failed_fit_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let rows: Vec<MetricRow> = (0..40)
        .map(|i| MetricRow::new(start() + Duration::minutes(i), "node-a", 50.0, 50.0, 100.0))
        .collect();
    let prom = dir.path().join("sentinel.prom");
    let config = csv_config(
        dir.path(),
        &rows,
        &format!(
            "detection:\n  method: isolation_forest\nruntime:\n  metrics_textfile: {}\n",
            prom.display()
        ),
    );
    let out = dir.path().join("out");

    let err = BatchRun::new(config, &out)
        .with_notifier(CapturingNotifier::default())
        .run()
        .unwrap_err();

    assert!(matches!(err, SentinelError::ModelFit(_)));
    assert!(!out.exists());

    // Run metrics still record the failure
    let text = std::fs::read_to_string(&prom).unwrap();
    assert!(text.contains("sentinel_last_run_success 0"));
}

fn forest_rows() -> Vec<MetricRow> {
    (0..200)
        .map(|i| {
            let ts = start() + Duration::seconds(20 * i as i64);
            if i == 150 {
                MetricRow::new(ts, "node-b", 99.0, 95.0, 390.0)
            } else {
                MetricRow::new(
                    ts,
                    "node-b",
                    30.0 + (i % 7) as f64,
                    40.0 + (i % 5) as f64,
                    80.0 + (i % 11) as f64,
                )
            }
        })
        .collect()
}

fn forest_run(dir: &Path, out: PathBuf) -> String {
    let config = csv_config(
        dir,
        &forest_rows(),
        "detection:\n  method: isolation_forest\n  seed: 7\n  n_estimators: 100\n",
    );
    BatchRun::new(config, &out)
        .with_notifier(CapturingNotifier::default())
        .run()
        .unwrap();
    std::fs::read_to_string(out.join(ANOMALIES_FILE)).unwrap()
}

#[test]
fn test_isolation_forest_run_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let first = forest_run(dir.path(), dir.path().join("first"));
    let second = forest_run(dir.path(), dir.path().join("second"));
    assert_eq!(first, second);

    let records = read_records(&dir.path().join("first").join(ANOMALIES_FILE));
    assert!(!records.is_empty());
    assert!(records.iter().all(|r| r.metric == "composite"));
    assert!(records
        .iter()
        .any(|r| r.timestamp == "2024-05-01T00:50:00+00:00"));
}

#[test]
fn test_metrics_textfile_written() {
    let dir = TempDir::new().unwrap();
    let prom = dir.path().join("sentinel.prom");
    let config = csv_config(
        dir.path(),
        &spiky_rows(25, &[24]),
        &format!("runtime:\n  metrics_textfile: {}\n", prom.display()),
    );

    let mut run = BatchRun::new(config, dir.path().join("out"))
        .with_notifier(CapturingNotifier::default());
    run.run().unwrap();

    let text = std::fs::read_to_string(&prom).unwrap();
    assert!(text.contains("sentinel_rows_loaded 25"));
    assert!(text.contains("sentinel_anomalies_detected 1"));
    assert!(text.contains("sentinel_alerts_emitted 1"));
    assert!(text.contains("sentinel_last_run_success 1"));
    assert_eq!(run.metrics().render(), text);
}
