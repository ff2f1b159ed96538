//! Configuration type definitions and defaults

use serde::{Deserialize, Serialize};

use crate::version::IdScheme;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub migrations: MigrationsConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
}

/// Where migrations live and how new ones are named
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationsConfig {
    /// Migrations directory, relative to the project root
    #[serde(default = "default_directory")]
    pub directory: String,
    /// Version scheme used by `create`
    #[serde(default)]
    pub id_scheme: IdScheme,
    /// Template used by `create` when none is given
    #[serde(default = "default_template")]
    pub template: String,
}

pub fn default_directory() -> String {
    "migrations".to_string()
}

pub fn default_template() -> String {
    "bash".to_string()
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            id_scheme: IdScheme::default(),
            template: default_template(),
        }
    }
}

/// How migrations are run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Kill a subprocess migration after this many seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}
