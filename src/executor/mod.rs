//! Running a single migration.
//!
//! A `MigrationRunner` is anything that, given an `ExecutionContext`,
//! performs a migration's effects and reports success or failure. Two
//! runners ship with the crate:
//!
//! - [`ProcessRunner`]: spawns the migration file as a subprocess and passes
//!   the context through `MIGRATE_*` environment variables
//! - [`InProcessRunner`]: calls registered Rust closures, for same-language
//!   migrations and embedders
//!
//! The [`Executor`] wraps a runner with the dry-run short circuit and turns
//! every runner error into a failed [`MigrationResult`].

mod in_process;
mod process;

pub use in_process::{InProcessRunner, MigrationFn};
pub use process::ProcessRunner;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::loader::Migration;

/// Environment variable carrying the absolute project root.
pub const ENV_PROJECT_ROOT: &str = "MIGRATE_PROJECT_ROOT";
/// Environment variable carrying the absolute migrations directory.
pub const ENV_MIGRATIONS_DIR: &str = "MIGRATE_MIGRATIONS_DIR";
/// Environment variable carrying the migration id.
pub const ENV_ID: &str = "MIGRATE_ID";
/// Environment variable carrying `true`/`false` for dry runs.
pub const ENV_DRY_RUN: &str = "MIGRATE_DRY_RUN";

/// Context handed to a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Absolute path to project root
    pub project_root: PathBuf,
    /// Absolute path to migrations directory
    pub migrations_dir: PathBuf,
    /// Current migration ID
    pub migration_id: String,
    /// Whether this is a dry run
    pub dry_run: bool,
}

impl ExecutionContext {
    /// The context as `MIGRATE_*` environment variables.
    pub fn env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                ENV_PROJECT_ROOT,
                self.project_root.to_string_lossy().to_string(),
            ),
            (
                ENV_MIGRATIONS_DIR,
                self.migrations_dir.to_string_lossy().to_string(),
            ),
            (ENV_ID, self.migration_id.clone()),
            (ENV_DRY_RUN, self.dry_run.to_string()),
        ]
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    /// Migration ID
    pub id: String,
    /// Whether the migration succeeded
    pub success: bool,
    /// When the attempt finished
    pub applied_at: DateTime<Utc>,
    /// Error message if the migration failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True if the migration was only previewed
    pub dry_run: bool,
}

/// Errors from running a single migration.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for migration process: {0}")]
    Wait(#[source] std::io::Error),

    #[error("exited with code {0}")]
    ExitCode(i32),

    #[error("terminated by signal {0}")]
    Signal(i32),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("file is not executable and no interpreter is known for {0}")]
    NoInterpreter(String),

    #[error("no in-process migration registered for this id")]
    NotRegistered,

    #[error("{0}")]
    Failed(String),

    #[error("panicked: {0}")]
    Panicked(String),
}

/// Result type for runner operations.
pub type RunResult = Result<(), RunError>;

/// Something that can apply one migration.
///
/// Runners are only ever called for non-dry runs, once per attempt, and one
/// at a time. Implementors must be `Send + Sync` so an engine can be moved
/// into a worker thread by embedders.
pub trait MigrationRunner: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Apply the migration's effects.
    fn run(&self, migration: &Migration, ctx: &ExecutionContext) -> RunResult;
}

/// Runs migrations through a runner, honouring dry runs.
pub struct Executor {
    runner: Box<dyn MigrationRunner>,
}

impl Executor {
    pub fn new(runner: Box<dyn MigrationRunner>) -> Self {
        Self { runner }
    }

    /// Name of the underlying runner.
    pub fn runner_name(&self) -> &'static str {
        self.runner.name()
    }

    /// Execute one migration and report the outcome.
    ///
    /// Dry runs never reach the runner and always succeed. Runner errors are
    /// the migration's own failure and come back as `success: false`.
    pub fn execute(&self, migration: &Migration, ctx: &ExecutionContext) -> MigrationResult {
        if ctx.dry_run {
            tracing::debug!(id = %migration.id, "dry run, skipping execution");
            return MigrationResult {
                id: migration.id.clone(),
                success: true,
                applied_at: Utc::now(),
                error: None,
                dry_run: true,
            };
        }

        tracing::debug!(id = %migration.id, runner = self.runner.name(), "executing migration");
        let outcome = self.runner.run(migration, ctx);
        let applied_at = Utc::now();

        match outcome {
            Ok(()) => MigrationResult {
                id: migration.id.clone(),
                success: true,
                applied_at,
                error: None,
                dry_run: false,
            },
            Err(e) => {
                tracing::warn!(id = %migration.id, error = %e, "migration failed");
                MigrationResult {
                    id: migration.id.clone(),
                    success: false,
                    applied_at,
                    error: Some(e.to_string()),
                    dry_run: false,
                }
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(Box::new(ProcessRunner::new()))
    }
}
