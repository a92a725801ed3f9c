//! Node Sentinel CLI
//!
//! A command-line tool for running anomaly checks over metric files,
//! generating demo data, asking the advisor about a reading and viewing
//! the anomalies saved by the last run.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{advise, run, show, simulate};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Node Sentinel CLI
#[derive(Parser)]
#[command(name = "sentinel")]
#[command(author, version, about = "CLI for Node Sentinel metric anomaly checks", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one batch: detect anomalies, print reports, save artifacts
    Run {
        /// Run configuration file (defaults to ~/.config/sentinel/config.yaml)
        #[arg(long, short, env = "SENTINEL_CONFIG")]
        config: Option<PathBuf>,

        /// Directory receiving the anomaly table and report text
        #[arg(long, default_value = "data")]
        output_dir: PathBuf,

        /// Do not print reports to stdout
        #[arg(long, short)]
        quiet: bool,
    },

    /// Generate a synthetic metric CSV
    Simulate {
        /// Output CSV path
        #[arg(long, short, default_value = "data/sample_metrics.csv")]
        output: PathBuf,

        /// Number of rows
        #[arg(long, default_value_t = 900)]
        periods: usize,

        /// Seconds between rows
        #[arg(long, default_value_t = 20)]
        interval_secs: i64,

        /// Number of injected CPU spikes
        #[arg(long, default_value_t = 12)]
        spikes: usize,

        /// Random seed for repeatable output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Ask the advisor about a single reading
    Advise {
        /// Node id
        #[arg(long, default_value = "unknown")]
        node: String,

        /// CPU utilisation in percent
        #[arg(long, default_value_t = 0.0)]
        cpu: f64,

        /// Memory utilisation in percent
        #[arg(long, default_value_t = 0.0)]
        memory: f64,

        /// Request latency in milliseconds
        #[arg(long, default_value_t = 0.0)]
        latency_ms: f64,

        /// Number of earlier anomalies seen on this node
        #[arg(long, default_value_t = 0)]
        recurring: usize,
    },

    /// Show the anomalies saved by the last run
    Show {
        /// Directory the last run wrote into
        #[arg(long, default_value = "data")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run {
            config,
            output_dir,
            quiet,
        } => {
            run::run_batch(config, &output_dir, quiet, cli.format)?;
        }
        Commands::Simulate {
            output,
            periods,
            interval_secs,
            spikes,
            seed,
        } => {
            simulate::simulate(&output, periods, interval_secs, spikes, seed, cli.format)?;
        }
        Commands::Advise {
            node,
            cpu,
            memory,
            latency_ms,
            recurring,
        } => {
            advise::advise(&node, cpu, memory, latency_ms, recurring, cli.format)?;
        }
        Commands::Show { dir } => {
            show::show_anomalies(&dir, cli.format)?;
        }
    }

    Ok(())
}
