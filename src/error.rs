//! Error types for migration operations.
//!
//! `MigrateError` covers everything that aborts an operation before (or
//! instead of) mutating state. A migration that fails while running is not an
//! operation error: it becomes a failed `MigrationResult`, and only the CLI
//! turns that into `MigrateError::Execution` to produce a non-zero exit.

use std::path::PathBuf;

/// Result alias for library operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

/// Errors that abort a status/up/create/baseline operation.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    #[error("Failed to read migrations directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid migration version '{0}' (expected 3 digits or 5 base36 characters)")]
    InvalidVersion(String),

    #[error("Invalid migration name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("{0}")]
    Conflict(String),

    #[error("Unknown template '{name}'. Available: {available}")]
    UnknownTemplate { name: String, available: String },

    #[error("Migration {id} failed: {message}")]
    Execution { id: String, message: String },

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl MigrateError {
    /// Wrap an IO error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MigrateError::Io {
            path: path.into(),
            source,
        }
    }
}
