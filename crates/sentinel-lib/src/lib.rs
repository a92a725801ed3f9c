//! Node Sentinel library
//!
//! This crate provides the core functionality for:
//! - Loading time-ordered per-node metrics from flat files
//! - Anomaly detection (rolling z-score, isolation forest)
//! - Rule-based remediation suggestions
//! - Incident report formatting and batch run orchestration
//! - Structured logging and run metrics

pub mod advisor;
pub mod anomaly;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod report;
pub mod simulator;
pub mod source;

pub use config::RunConfig;
pub use error::{Result, SentinelError};
pub use models::*;
pub use observability::{RunMetrics, StructuredLogger};
pub use pipeline::{BatchRun, ConsoleNotifier, Notifier, RunSummary};
