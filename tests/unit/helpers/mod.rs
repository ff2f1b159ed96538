//! Test helper utilities

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use migrate::{Engine, ExecutionContext, InProcessRunner};
use tempfile::TempDir;

/// Create a scratch project with an empty `migrations/` directory.
pub fn project() -> (TempDir, PathBuf) {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let migrations = temp.path().join("migrations");
    fs::create_dir_all(&migrations).expect("Failed to create migrations dir");
    (temp, migrations)
}

/// Write a migration file with placeholder content.
pub fn touch_migration(migrations: &Path, filename: &str) -> PathBuf {
    let path = migrations.join(filename);
    fs::write(&path, "# Description: test migration\n").expect("Failed to write migration");
    path
}

/// Shared log of executed migration ids, in call order.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, ctx: &ExecutionContext) {
        self.0.lock().unwrap().push(ctx.migration_id.clone());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// In-process runner where every listed id succeeds and records itself.
pub fn recording_runner(log: &CallLog, ids: &[&str]) -> InProcessRunner {
    ids.iter().fold(InProcessRunner::new(), |runner, id| {
        let log = log.clone();
        runner.register(*id, move |ctx| {
            log.record(ctx);
            Ok(())
        })
    })
}

/// Engine for a scratch project using the given runner.
pub fn engine(root: &Path, runner: InProcessRunner) -> Engine {
    Engine::new(root, "migrations").with_runner(runner)
}

/// Non-comment lines of the history file.
pub fn history_ids(migrations: &Path) -> Vec<String> {
    fs::read_to_string(migrations.join(".history"))
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_whitespace().next().map(str::to_string))
        .collect()
}
