//! The migration engine: `status`, `up`, `create` and `baseline`.
//!
//! An [`Engine`] is bound to one project root and one migrations directory.
//! It composes discovery, the history/baseline store and an [`Executor`],
//! and returns structured results. It never prints and never exits.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::baseline::{covered_by, delete_baselined_migrations, read_baseline, write_baseline};
use crate::error::{MigrateError, Result};
use crate::executor::{ExecutionContext, Executor, MigrationResult, MigrationRunner};
use crate::files::filename;
use crate::loader::{discover_migrations, list_migration_files, Migration};
use crate::state::{append_history, compute_state, read_history, MigrationState};
use crate::templates::{get_template, list_templates};
use crate::version::{IdScheme, Version};

/// Options for [`Engine::baseline`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaselineOptions {
    /// Keep migration files at or below the baseline instead of deleting them
    pub keep_files: bool,
    /// Compute the summary without writing or deleting anything
    pub dry_run: bool,
    /// Note on what the baseline squashes, stored as comments in `.baseline`
    pub summary: Option<String>,
}

/// What a baseline operation did (or would do, for dry runs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaselineSummary {
    /// The new baseline version
    pub version: Version,
    /// Migration files deleted (or that would be deleted)
    pub deleted: Vec<PathBuf>,
    /// Ids at or below the baseline that history never recorded
    pub absorbed: Vec<String>,
    /// True if nothing was written
    pub dry_run: bool,
}

/// Runs migration operations against one migrations directory.
pub struct Engine {
    project_root: PathBuf,
    migrations_dir: PathBuf,
    executor: Executor,
    id_scheme: IdScheme,
}

impl Engine {
    /// Create an engine using the subprocess runner.
    ///
    /// A relative `migrations_dir` is resolved against `project_root`; a
    /// relative `project_root` against the current working directory.
    pub fn new(project_root: impl AsRef<Path>, migrations_dir: impl AsRef<Path>) -> Self {
        let project_root = absolutize(project_root.as_ref());
        let migrations_dir = without_cur_dir(&project_root.join(migrations_dir.as_ref()));
        Self {
            project_root,
            migrations_dir,
            executor: Executor::default(),
            id_scheme: IdScheme::default(),
        }
    }

    /// Replace the runner used for non-dry runs.
    pub fn with_runner(mut self, runner: impl MigrationRunner + 'static) -> Self {
        self.executor = Executor::new(Box::new(runner));
        self
    }

    /// Choose how `create` allocates versions.
    pub fn with_id_scheme(mut self, id_scheme: IdScheme) -> Self {
        self.id_scheme = id_scheme;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Discover migrations and partition them into applied and pending.
    pub fn status(&self) -> Result<MigrationState> {
        let available = discover_migrations(&self.migrations_dir)?;
        compute_state(&self.migrations_dir, available)
    }

    /// Apply pending migrations in ascending order, stopping at the first
    /// failure.
    ///
    /// Returns one result per attempted migration. Only successful non-dry
    /// runs are appended to history; a run whose history append fails is
    /// reported as failed and halts the loop.
    pub fn up(&self, dry_run: bool) -> Result<Vec<MigrationResult>> {
        let state = self.status()?;
        if state.pending.is_empty() {
            tracing::debug!("no pending migrations");
            return Ok(Vec::new());
        }

        tracing::info!(
            pending = state.pending.len(),
            dry_run,
            runner = self.executor.runner_name(),
            "applying migrations"
        );

        let mut results = Vec::with_capacity(state.pending.len());
        for migration in &state.pending {
            let ctx = self.context_for(migration, dry_run);
            let mut result = self.executor.execute(migration, &ctx);

            if result.success && !result.dry_run {
                if let Err(e) = append_history(&self.migrations_dir, &result.id, result.applied_at)
                {
                    tracing::error!(id = %migration.id, error = %e, "migration ran but history append failed");
                    result.success = false;
                    result.error = Some(format!("applied but not recorded in history: {}", e));
                }
            }

            let failed = !result.success;
            results.push(result);
            if failed {
                tracing::warn!(id = %migration.id, "halting after failed migration");
                break;
            }
        }

        Ok(results)
    }

    /// Create a new migration file from a template and return its path.
    pub fn create(&self, name: &str, description: Option<&str>, template: &str) -> Result<PathBuf> {
        let sanitized = filename::sanitize(name);
        if sanitized.is_empty() {
            return Err(MigrateError::InvalidName {
                name: name.to_string(),
                reason: "nothing left after sanitizing".to_string(),
            });
        }

        let template = get_template(template).ok_or_else(|| MigrateError::UnknownTemplate {
            name: template.to_string(),
            available: list_templates().collect::<Vec<_>>().join(", "),
        })?;

        let available = list_migration_files(&self.migrations_dir)?;
        let baseline = read_baseline(&self.migrations_dir)?;
        let version = next_version(self.id_scheme, &available, baseline, Utc::now())?;

        let file_name = version.filename(&sanitized, template.extension);
        filename::validate_length(&file_name).map_err(|e| MigrateError::InvalidName {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        fs::create_dir_all(&self.migrations_dir)
            .map_err(|e| MigrateError::io(&self.migrations_dir, e))?;

        let path = self.migrations_dir.join(&file_name);
        let mut file = match open_new_script(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(MigrateError::Conflict(format!(
                    "Migration file already exists: {}",
                    path.display()
                )))
            }
            Err(e) => return Err(MigrateError::io(&path, e)),
        };
        file.write_all(template.render(description).as_bytes())
            .map_err(|e| MigrateError::io(&path, e))?;

        tracing::info!(path = %path.display(), template = template.name, "created migration");
        Ok(path)
    }

    /// Record a baseline at `version`.
    ///
    /// Everything at or below the baseline counts as applied from now on.
    /// Unless `keep_files` is set, those migration files are deleted. History
    /// is left untouched.
    pub fn baseline(&self, version: &str, options: BaselineOptions) -> Result<BaselineSummary> {
        let target: Version = version.trim().parse()?;

        let available = list_migration_files(&self.migrations_dir)?;
        let existing = read_baseline(&self.migrations_dir)?;

        let highest = available.iter().map(|m| m.version).chain(existing).max();
        match highest {
            None => {
                return Err(MigrateError::Conflict(format!(
                    "Cannot baseline at '{}': no migrations found in {}",
                    target,
                    self.migrations_dir.display()
                )))
            }
            Some(highest) if target > highest => {
                return Err(MigrateError::Conflict(format!(
                    "Cannot baseline at '{}': newest known migration is '{}'",
                    target, highest
                )))
            }
            Some(_) => {}
        }

        if let Some(existing) = existing {
            if target < existing {
                return Err(MigrateError::Conflict(format!(
                    "Cannot move baseline backward from '{}' to '{}'",
                    existing, target
                )));
            }
        }

        let applied = read_history(&self.migrations_dir)?;
        let applied_ids: HashSet<&str> = applied.iter().map(|a| a.id.as_str()).collect();
        let covered = covered_by(target, &available);
        let absorbed = covered
            .iter()
            .filter(|m| !applied_ids.contains(m.id.as_str()))
            .map(|m| m.id.clone())
            .collect();

        let deleted = if options.dry_run {
            if options.keep_files {
                Vec::new()
            } else {
                covered.iter().map(|m| m.file_path.clone()).collect()
            }
        } else {
            write_baseline(
                &self.migrations_dir,
                target,
                Utc::now(),
                options.summary.as_deref(),
            )?;
            if options.keep_files {
                Vec::new()
            } else {
                delete_baselined_migrations(target, &available)?
            }
        };

        tracing::info!(
            version = %target,
            deleted = deleted.len(),
            dry_run = options.dry_run,
            "baseline recorded"
        );

        Ok(BaselineSummary {
            version: target,
            deleted,
            absorbed,
            dry_run: options.dry_run,
        })
    }

    fn context_for(&self, migration: &Migration, dry_run: bool) -> ExecutionContext {
        ExecutionContext {
            project_root: self.project_root.clone(),
            migrations_dir: self.migrations_dir.clone(),
            migration_id: migration.id.clone(),
            dry_run,
        }
    }
}

/// True if every result succeeded.
pub fn all_succeeded(results: &[MigrationResult]) -> bool {
    results.iter().all(|r| r.success)
}

/// Pick the version for a new migration.
///
/// Timestamps start at the slot containing `now`, or just past the highest
/// known version if that is not behind the clock. Counters continue from
/// the highest known counter. Versions still in use are skipped.
pub fn next_version(
    scheme: IdScheme,
    available: &[Migration],
    baseline: Option<Version>,
    now: DateTime<Utc>,
) -> Result<Version> {
    let known: Vec<Version> = available
        .iter()
        .map(|m| m.version)
        .chain(baseline)
        .collect();
    let used: HashSet<Version> = known.iter().copied().collect();

    let start = match scheme {
        IdScheme::Timestamp => {
            let now_version = Version::timestamp_at(now).ok_or_else(|| {
                MigrateError::Conflict(format!(
                    "Cannot derive a timestamp version from {}",
                    now.to_rfc3339()
                ))
            })?;
            match known.iter().max() {
                Some(highest) if *highest >= now_version => highest.next(),
                _ => Some(now_version),
            }
        }
        IdScheme::Counter => {
            if let Some(timestamp) = known.iter().find(|v| !v.is_counter()) {
                return Err(MigrateError::Conflict(format!(
                    "Counter versions sort before existing timestamp version '{}'; use the timestamp id scheme",
                    timestamp
                )));
            }
            match known.iter().max() {
                Some(highest) => highest.next(),
                None => Some(Version::Counter(1)),
            }
        }
    };

    let mut candidate = start;
    while let Some(version) = candidate {
        if !used.contains(&version) {
            return Ok(version);
        }
        candidate = version.next();
    }

    Err(MigrateError::Conflict(match scheme {
        IdScheme::Counter => "Counter versions exhausted (max 999)".to_string(),
        IdScheme::Timestamp => "Timestamp versions exhausted".to_string(),
    }))
}

fn open_new_script(path: &Path) -> std::io::Result<fs::File> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o755);
    }
    options.open(path)
}

fn absolutize(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    without_cur_dir(&absolute)
}

/// Drop `.` components; `..` is kept since it may cross a symlink.
fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
