//! In-process runner backed by Rust closures.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use super::{ExecutionContext, MigrationRunner, RunError, RunResult};
use crate::loader::Migration;

/// A migration's `up` entry point.
pub type MigrationFn = Box<dyn Fn(&ExecutionContext) -> anyhow::Result<()> + Send + Sync>;

/// Runs migrations by calling closures registered under their id.
///
/// The migration file on disk still decides ordering and identity; the
/// closure replaces spawning it.
#[derive(Default)]
pub struct InProcessRunner {
    migrations: HashMap<String, MigrationFn>,
}

impl InProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the `up` function for a migration id.
    pub fn register<F>(mut self, id: impl Into<String>, up: F) -> Self
    where
        F: Fn(&ExecutionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.migrations.insert(id.into(), Box::new(up));
        self
    }
}

impl MigrationRunner for InProcessRunner {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn run(&self, migration: &Migration, ctx: &ExecutionContext) -> RunResult {
        let up = self
            .migrations
            .get(&migration.id)
            .ok_or(RunError::NotRegistered)?;

        match panic::catch_unwind(AssertUnwindSafe(|| up(ctx))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RunError::Failed(format!("{:#}", e))),
            Err(payload) => Err(RunError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
