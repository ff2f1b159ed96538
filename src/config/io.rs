//! Configuration I/O operations

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::types::Config;

/// Name of the project config file.
pub const CONFIG_FILE: &str = "migrate.toml";

/// Get the config file path (<project_root>/migrate.toml)
pub fn config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_FILE)
}

/// Load configuration from file, or return defaults if not found
pub fn load(project_root: &Path) -> Result<Config> {
    let config_path = config_path(project_root);

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
        tracing::debug!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        Ok(Config::default())
    }
}
