//! Agent configuration

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Run configuration document (YAML)
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,

    /// Directory receiving the anomaly table and report text
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_config_path() -> PathBuf {
    PathBuf::from("configs/config.yaml")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            config_path: default_config_path(),
            output_dir: default_output_dir(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from `SENTINEL_AGENT_*` environment variables
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SENTINEL_AGENT"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_default())
    }
}
