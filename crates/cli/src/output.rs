//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use sentinel_lib::advisor::Severity;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional metric value
pub fn format_value(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "-".to_string(),
    }
}

/// Color a percentage by how close it is to saturation
pub fn color_percent(value: Option<f64>) -> String {
    let formatted = format_value(value, 1);
    match value {
        Some(v) if v >= 90.0 => formatted.red().to_string(),
        Some(v) if v >= 75.0 => formatted.yellow().to_string(),
        _ => formatted,
    }
}

/// Color a severity label
pub fn color_severity(severity: Severity) -> String {
    let label = severity.to_string();
    match severity {
        Severity::Critical => label.red().bold().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Informational => label.blue().to_string(),
    }
}
