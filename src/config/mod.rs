//! Project configuration (`migrate.toml`)

mod io;
mod types;

pub use io::CONFIG_FILE;
pub use types::*;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

impl Config {
    /// Get the config file path for a project
    pub fn config_path(project_root: &Path) -> PathBuf {
        io::config_path(project_root)
    }

    /// Load configuration from the project root, or return defaults if not found
    pub fn load(project_root: &Path) -> Result<Self> {
        io::load(project_root)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Subprocess timeout, if configured
    pub fn timeout(&self) -> Option<Duration> {
        self.execution.timeout_secs.map(Duration::from_secs)
    }
}
