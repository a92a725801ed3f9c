//! Rule-based remediation suggestions
//!
//! Rules are evaluated top-down and the first match wins, so correlated
//! conditions (CPU with memory, CPU with latency) outrank single-metric ones.
//! A node with a recurring history gets an extra note whatever rule fired.

use serde::Serialize;
use std::fmt;

use crate::models::{MetricRow, NodeHistory};

/// Appended when a node has more than three prior anomalies
pub const RECURRING_NOTE: &str =
    "Note: Multiple anomalies detected on this node recently → consider cordoning or replacing node.";

/// Urgency of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Informational,
}

impl Severity {
    fn icon(&self) -> &'static str {
        match self {
            Severity::Critical => "🚨",
            Severity::Warning => "⚠️",
            Severity::Informational => "ℹ️",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "critical"),
            Severity::Warning => write!(f, "warning"),
            Severity::Informational => write!(f, "informational"),
        }
    }
}

/// Metric values a rule looks at; missing values read as zero
#[derive(Debug, Clone)]
pub struct Reading<'a> {
    pub node: &'a str,
    pub cpu: f64,
    pub memory: f64,
    pub latency_ms: f64,
}

impl<'a> From<&'a MetricRow> for Reading<'a> {
    fn from(row: &'a MetricRow) -> Self {
        Self {
            node: if row.node.is_empty() { "unknown" } else { row.node.as_str() },
            cpu: row.cpu.unwrap_or(0.0),
            memory: row.memory.unwrap_or(0.0),
            latency_ms: row.latency_ms.unwrap_or(0.0),
        }
    }
}

/// One entry of the rule table
pub struct Rule {
    pub name: &'static str,
    pub severity: Severity,
    applies: fn(&Reading) -> bool,
    render: fn(&Reading) -> String,
}

impl Rule {
    pub fn applies(&self, reading: &Reading) -> bool {
        (self.applies)(reading)
    }
}

static RULES: [Rule; 9] = [
    Rule {
        name: "cpu_memory_saturation",
        severity: Severity::Critical,
        applies: |r| r.cpu >= 90.0 && r.memory >= 85.0,
        render: |r| {
            format!(
                "Node {} shows CPU {:.1}% + Memory {:.1}%.\n\
                 Likely cause: memory leak or workload saturation.\n\
                 Suggested Action: Restart affected pod and check garbage collection logs.",
                r.node, r.cpu, r.memory
            )
        },
    },
    Rule {
        name: "downstream_bottleneck",
        severity: Severity::Critical,
        applies: |r| r.cpu >= 85.0 && r.latency_ms >= 200.0,
        render: |r| {
            format!(
                "High CPU {:.1}% with Latency {:.0}ms on {}.\n\
                 Possible DB or downstream service bottleneck.\n\
                 Suggested Action: Profile DB queries and scale replicas if needed.",
                r.cpu, r.latency_ms, r.node
            )
        },
    },
    Rule {
        name: "network_congestion",
        severity: Severity::Warning,
        applies: |r| r.latency_ms >= 250.0 && r.cpu < 70.0 && r.memory < 70.0,
        render: |r| {
            format!(
                "Latency {:.0}ms on {} while CPU/Memory normal.\n\
                 Likely cause: network congestion or downstream dependency issue.\n\
                 Suggested Action: Check API gateway logs and network connectivity.",
                r.latency_ms, r.node
            )
        },
    },
    Rule {
        name: "cpu_spike",
        severity: Severity::Critical,
        applies: |r| r.cpu >= 95.0,
        render: |r| {
            format!(
                "CPU spike {:.1}% on {}.\n\
                 Suggested Action: Kill runaway process or scale api-service replicas.",
                r.cpu, r.node
            )
        },
    },
    Rule {
        name: "sustained_cpu",
        severity: Severity::Warning,
        applies: |r| r.cpu >= 80.0,
        render: |r| {
            format!(
                "Sustained CPU load {:.1}% on {}.\n\
                 Suggested Action: Inspect logs for infinite loops or long-running jobs.",
                r.cpu, r.node
            )
        },
    },
    Rule {
        name: "memory_exhaustion",
        severity: Severity::Critical,
        applies: |r| r.memory >= 90.0,
        render: |r| {
            format!(
                "Memory exhaustion {:.1}% on {}.\n\
                 Suggested Action: Restart pod, check heap dump, and tune JVM/GC params.",
                r.memory, r.node
            )
        },
    },
    Rule {
        name: "elevated_memory",
        severity: Severity::Warning,
        applies: |r| r.memory >= 75.0,
        render: |r| {
            format!(
                "Elevated memory usage {:.1}% on {}.\n\
                 Suggested Action: Monitor caches and investigate object retention.",
                r.memory, r.node
            )
        },
    },
    Rule {
        name: "elevated_latency",
        severity: Severity::Warning,
        applies: |r| r.latency_ms >= 150.0,
        render: |r| {
            format!(
                "Latency above 150ms ({:.0}ms) on {}.\n\
                 Suggested Action: Check DB indexes and downstream service health.",
                r.latency_ms, r.node
            )
        },
    },
    Rule {
        name: "mild_anomaly",
        severity: Severity::Informational,
        applies: |_| true,
        render: |r| {
            format!(
                "Mild anomaly on {}.\n\
                 Suggested Action: Monitor trends; no immediate remediation required.",
                r.node
            )
        },
    },
];

/// The rule table in evaluation order
pub fn rules() -> &'static [Rule] {
    &RULES
}

/// A rendered suggestion with the rule that produced it
#[derive(Debug, Clone, Serialize)]
pub struct Advice {
    pub rule: &'static str,
    pub severity: Severity,
    pub escalated: bool,
    pub text: String,
}

impl fmt::Display for Advice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Pick the first matching rule for a row
///
/// `history` holds prior anomalies of the batch; only rows of this row's
/// node are counted.
pub fn assess(row: &MetricRow, history: Option<&[MetricRow]>) -> Advice {
    let reading = Reading::from(row);
    let rule = RULES
        .iter()
        .find(|rule| rule.applies(&reading))
        .unwrap_or(&RULES[RULES.len() - 1]);

    let mut text = format!(
        "{} {}: {}",
        rule.severity.icon(),
        capitalize(&rule.severity.to_string()),
        (rule.render)(&reading)
    );

    let escalated = history
        .map(|rows| NodeHistory::of(&row.node, rows).is_recurring())
        .unwrap_or(false);
    if escalated {
        text.push('\n');
        text.push_str(RECURRING_NOTE);
    }

    Advice {
        rule: rule.name,
        severity: rule.severity,
        escalated,
        text,
    }
}

/// Suggestion text for a row
pub fn advise(row: &MetricRow, history: Option<&[MetricRow]>) -> String {
    assess(row, history).text
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn row(node: &str, cpu: f64, memory: f64, latency: f64) -> MetricRow {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        MetricRow::new(ts, node, cpu, memory, latency)
    }

    fn history(node: &str, count: usize) -> Vec<MetricRow> {
        (0..count)
            .map(|i| {
                let mut r = row(node, 90.0, 50.0, 80.0);
                r.timestamp = r.timestamp - Duration::minutes(i as i64 + 1);
                r
            })
            .collect()
    }

    #[test]
    fn test_saturation_outranks_cpu_spike() {
        let advice = assess(&row("node-a", 95.0, 90.0, 80.0), None);
        assert_eq!(advice.rule, "cpu_memory_saturation");
        assert!(advice.text.starts_with("🚨 Critical: Node node-a shows CPU 95.0% + Memory 90.0%."));
    }

    #[test]
    fn test_cascade_order() {
        let cases = [
            ((90.0, 85.0, 10.0), "cpu_memory_saturation"),
            ((89.9, 85.0, 10.0), "sustained_cpu"),
            ((86.0, 50.0, 200.0), "downstream_bottleneck"),
            ((60.0, 60.0, 250.0), "network_congestion"),
            ((60.0, 70.0, 250.0), "elevated_latency"),
            ((96.0, 50.0, 100.0), "cpu_spike"),
            ((80.0, 50.0, 100.0), "sustained_cpu"),
            ((50.0, 90.0, 100.0), "memory_exhaustion"),
            ((50.0, 75.0, 100.0), "elevated_memory"),
            ((50.0, 50.0, 150.0), "elevated_latency"),
            ((50.0, 50.0, 149.0), "mild_anomaly"),
        ];

        for ((cpu, memory, latency), expected) in cases {
            let advice = assess(&row("node-a", cpu, memory, latency), None);
            assert_eq!(advice.rule, expected, "cpu={cpu} memory={memory} latency={latency}");
        }
    }

    #[test]
    fn test_template_formatting() {
        let text = advise(&row("node-c", 86.04, 40.0, 212.6), None);
        assert_eq!(
            text,
            "🚨 Critical: High CPU 86.0% with Latency 213ms on node-c.\n\
             Possible DB or downstream service bottleneck.\n\
             Suggested Action: Profile DB queries and scale replicas if needed."
        );

        let text = advise(&row("node-b", 20.0, 30.0, 40.0), None);
        assert!(text.starts_with("ℹ️ Informational: Mild anomaly on node-b."));
    }

    #[test]
    fn test_missing_values_read_as_zero() {
        let mut r = row("", 0.0, 0.0, 0.0);
        r.cpu = None;
        r.memory = None;
        r.latency_ms = None;

        let advice = assess(&r, None);
        assert_eq!(advice.rule, "mild_anomaly");
        assert!(advice.text.contains("on unknown."));
    }

    #[test]
    fn test_escalation_boundary() {
        let target = row("node-a", 50.0, 50.0, 80.0);

        let four = history("node-a", 4);
        let advice = assess(&target, Some(&four));
        assert!(advice.escalated);
        assert!(advice.text.ends_with(RECURRING_NOTE));

        let three = history("node-a", 3);
        let advice = assess(&target, Some(&three));
        assert!(!advice.escalated);
        assert!(!advice.text.contains(RECURRING_NOTE));
    }

    #[test]
    fn test_escalation_counts_only_same_node() {
        let mut others = history("node-b", 6);
        others.extend(history("node-a", 2));

        let advice = assess(&row("node-a", 99.0, 99.0, 80.0), Some(&others));
        assert_eq!(advice.rule, "cpu_memory_saturation");
        assert!(!advice.escalated);
    }

    #[test]
    fn test_escalation_is_additive() {
        let four = history("node-a", 4);
        let plain = advise(&row("node-a", 96.0, 50.0, 80.0), None);
        let escalated = advise(&row("node-a", 96.0, 50.0, 80.0), Some(&four));
        assert_eq!(escalated, format!("{}\n{}", plain, RECURRING_NOTE));
    }

    #[test]
    fn test_rule_table_ends_with_catch_all() {
        let last = rules().last().unwrap();
        assert_eq!(last.severity, Severity::Informational);
        assert!(last.applies(&Reading {
            node: "x",
            cpu: 0.0,
            memory: 0.0,
            latency_ms: 0.0
        }));
    }
}
