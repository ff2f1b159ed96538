//! Filesystem migration runner.
//!
//! Applies an ordered sequence of executable migration files to a project
//! directory and records which ones ran, so re-running is idempotent.
//!
//! ```no_run
//! use migrate::Engine;
//!
//! let engine = Engine::new(".", "migrations");
//! let results = engine.up(false)?;
//! assert!(migrate::all_succeeded(&results));
//! # Ok::<(), migrate::MigrateError>(())
//! ```

pub mod baseline;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod files;
pub mod loader;
pub mod state;
pub mod templates;
pub mod version;

pub use config::Config;
pub use engine::{all_succeeded, BaselineOptions, BaselineSummary, Engine};
pub use error::{MigrateError, Result};
pub use executor::{
    ExecutionContext, Executor, InProcessRunner, MigrationResult, MigrationRunner, ProcessRunner,
    RunError,
};
pub use loader::Migration;
pub use state::{AppliedMigration, MigrationState};
pub use version::{IdScheme, Version};
