//! Applied-migration history and the applied/pending partition.
//!
//! History lives in `<migrations>/.history`, one `<id> <RFC 3339 timestamp>`
//! line per applied migration, in the order they were applied. The file is
//! only ever appended to. Blank lines and lines starting with `#` are
//! ignored so the file can carry hand-written notes.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::baseline::read_baseline;
use crate::error::{MigrateError, Result};
use crate::loader::Migration;
use crate::version::Version;

/// Name of the history file inside the migrations directory.
pub const HISTORY_FILE: &str = ".history";

/// Record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    /// Migration ID
    pub id: String,
    /// When the migration was applied
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    /// Version encoded in the id, if the id still has a valid prefix.
    pub fn version(&self) -> Option<Version> {
        let (prefix, _) = self.id.split_once('-')?;
        Version::parse(prefix)
    }
}

/// Applied/pending partition of a migrations directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationState {
    /// History records, in application order
    pub applied: Vec<AppliedMigration>,
    /// Available migrations not yet applied, in version order
    pub pending: Vec<Migration>,
    /// Every migration file found on disk, in version order
    pub available: Vec<Migration>,
    /// Baseline cutoff, if one was recorded
    pub baseline: Option<Version>,
}

impl MigrationState {
    /// Version of the newest available migration that counts as applied.
    pub fn current_version(&self) -> Option<Version> {
        let pending: HashSet<&str> = self.pending.iter().map(|m| m.id.as_str()).collect();
        self.available
            .iter()
            .rfind(|m| !pending.contains(m.id.as_str()))
            .map(|m| m.version)
            .or(self.baseline)
    }

    /// Version of the newest available migration.
    pub fn target_version(&self) -> Option<Version> {
        self.available.last().map(|m| m.version)
    }

    /// True when the record's version is at or below the baseline.
    pub fn is_baselined(&self, record: &AppliedMigration) -> bool {
        match (self.baseline, record.version()) {
            (Some(baseline), Some(version)) => version <= baseline,
            _ => false,
        }
    }

    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Read the history file and return all applied migrations.
///
/// A missing file is an empty history. A malformed line fails the whole
/// read so applied state is never silently dropped.
pub fn read_history(migrations_dir: &Path) -> Result<Vec<AppliedMigration>> {
    let history_path = migrations_dir.join(HISTORY_FILE);

    let file = match fs::File::open(&history_path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(MigrateError::io(&history_path, e)),
    };

    let mut applied = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| MigrateError::io(&history_path, e))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parse_error = |message: String| MigrateError::Parse {
            path: history_path.clone(),
            line: index + 1,
            message,
        };

        let mut fields = line.split_whitespace();
        let (Some(id), Some(timestamp)) = (fields.next(), fields.next()) else {
            return Err(parse_error(format!(
                "expected '<id> <timestamp>', found '{}'",
                line
            )));
        };

        let applied_at = DateTime::parse_from_rfc3339(timestamp)
            .map_err(|e| parse_error(format!("invalid timestamp '{}': {}", timestamp, e)))?
            .with_timezone(&Utc);

        applied.push(AppliedMigration {
            id: id.to_string(),
            applied_at,
        });
    }

    Ok(applied)
}

/// Append one record to the history file, creating it if needed.
///
/// The line is written with a single append so existing lines are never
/// rewritten.
pub fn append_history(migrations_dir: &Path, id: &str, applied_at: DateTime<Utc>) -> Result<()> {
    fs::create_dir_all(migrations_dir).map_err(|e| MigrateError::io(migrations_dir, e))?;
    let history_path = migrations_dir.join(HISTORY_FILE);

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&history_path)
        .map_err(|e| MigrateError::io(&history_path, e))?;

    let line = format!("{} {}\n", id, applied_at.to_rfc3339());
    file.write_all(line.as_bytes())
        .map_err(|e| MigrateError::io(&history_path, e))?;

    tracing::debug!(id, "recorded migration in history");
    Ok(())
}

/// Get pending migrations: available, not in history, and above the baseline.
pub fn get_pending(
    available: &[Migration],
    applied: &[AppliedMigration],
    baseline: Option<Version>,
) -> Vec<Migration> {
    let applied_ids: HashSet<&str> = applied.iter().map(|a| a.id.as_str()).collect();

    available
        .iter()
        .filter(|m| !applied_ids.contains(m.id.as_str()))
        .filter(|m| baseline.map_or(true, |b| m.version > b))
        .cloned()
        .collect()
}

/// Compute the applied/pending partition for already-discovered migrations.
pub fn compute_state(migrations_dir: &Path, available: Vec<Migration>) -> Result<MigrationState> {
    let applied = read_history(migrations_dir)?;
    let baseline = read_baseline(migrations_dir)?;
    let pending = get_pending(&available, &applied, baseline);

    tracing::debug!(
        applied = applied.len(),
        pending = pending.len(),
        available = available.len(),
        baseline = ?baseline.map(|b| b.to_string()),
        "computed migration state"
    );

    Ok(MigrationState {
        applied,
        pending,
        available,
        baseline,
    })
}
