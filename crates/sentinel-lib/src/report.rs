//! Fixed-layout incident text for one anomaly event

use crate::models::AnomalyEvent;

/// Used when an event carries no suggestion
pub const DEFAULT_SUGGESTION: &str = "Investigate logs or scale pods.";

/// Separator between reports in the saved report file
pub const REPORT_SEPARATOR: &str = "\n\n";

/// Render an event: the suggestion verbatim, then one bullet per field
pub fn format_event(event: &AnomalyEvent) -> String {
    let when = event
        .timestamp
        .as_ref()
        .map(|ts| ts.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let node = event.node.as_deref().unwrap_or("unknown");
    let metric = event.metric.as_deref().unwrap_or("cpu");
    let value = event
        .value
        .map(|v| format!("{:?}", v))
        .unwrap_or_else(|| "N/A".to_string());
    let suggestion = event.suggestion.as_deref().unwrap_or(DEFAULT_SUGGESTION);

    format!(
        "{}\n• Time: {}\n• Node: {}\n• Metric: {}\n• Value: {}",
        suggestion.trim(),
        when,
        node,
        metric,
        value
    )
}

/// Join rendered reports into the saved report text
pub fn join_reports<S: AsRef<str>>(reports: &[S]) -> String {
    reports
        .iter()
        .map(|r| r.as_ref())
        .collect::<Vec<_>>()
        .join(REPORT_SEPARATOR)
}
