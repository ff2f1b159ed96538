//! Command handlers for the migrate CLI.
//!
//! Each submodule handles a specific CLI command or command group.
//! The main dispatch logic remains in main.rs.

pub mod baseline;
pub mod completions;
pub mod config;
pub mod create;
pub mod status;
pub mod up;

use anyhow::Result;
use std::path::{Path, PathBuf};

use migrate::files::lock::{self, LockGuard};
use migrate::{Config, Engine, ProcessRunner};

/// Resolved project settings shared by every command.
pub struct Context {
    pub project_root: PathBuf,
    pub migrations_dir: PathBuf,
    pub config: Config,
}

impl Context {
    /// Load `migrate.toml` from `root` and apply the `--migrations` override.
    pub fn resolve(root: &Path, migrations: Option<&Path>) -> Result<Self> {
        let config = Config::load(root)?;
        let migrations_dir = migrations
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&config.migrations.directory));
        Ok(Self {
            project_root: root.to_path_buf(),
            migrations_dir,
            config,
        })
    }

    /// Build an engine using the subprocess runner and the configured timeout.
    pub fn engine(&self) -> Engine {
        let runner = match self.config.timeout() {
            Some(timeout) => ProcessRunner::with_timeout(timeout),
            None => ProcessRunner::new(),
        };
        Engine::new(&self.project_root, &self.migrations_dir)
            .with_runner(runner)
            .with_id_scheme(self.config.migrations.id_scheme)
    }

    /// Take the migrations directory lock for a mutating command.
    pub fn lock(&self, engine: &Engine) -> Result<LockGuard> {
        lock::acquire(engine.migrations_dir())
    }
}

/// Path relative to the project root when possible, for display.
pub fn display_path(engine: &Engine, path: &Path) -> String {
    path.strip_prefix(engine.project_root())
        .unwrap_or(path)
        .display()
        .to_string()
}
