//! Configuration file lookup for the CLI

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Resolve the run configuration path, falling back to the per-user file
pub fn resolve_config_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        return Ok(path);
    }
    default_config_path()
}

/// `~/.config/sentinel/config.yaml`
pub fn default_config_path() -> Result<PathBuf> {
    let home = dirs_next::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("sentinel").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let path = resolve_config_path(Some(PathBuf::from("custom.yaml"))).unwrap();
        assert_eq!(path, PathBuf::from("custom.yaml"));
    }

    #[test]
    fn test_default_under_home() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with(".config/sentinel/config.yaml"));
        }
    }
}
