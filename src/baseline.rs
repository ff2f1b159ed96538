//! Baseline cutoff.
//!
//! `<migrations>/.baseline` holds a single version. Every migration at or
//! below it counts as applied whether or not history mentions it, and its
//! file may be deleted. History is never pruned when baselining.
//!
//! The creation time and an optional summary of the squashed migrations
//! follow the version as `#` comment lines:
//!
//! ```text
//! 1f72f
//! # created: 2024-06-15T14:30:00+00:00
//! # initial project layout
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{MigrateError, Result};
use crate::loader::Migration;
use crate::version::Version;

/// Name of the baseline file inside the migrations directory.
pub const BASELINE_FILE: &str = ".baseline";

/// Read the baseline version, if one was recorded.
pub fn read_baseline(migrations_dir: &Path) -> Result<Option<Version>> {
    let baseline_path = migrations_dir.join(BASELINE_FILE);

    let content = match fs::read_to_string(&baseline_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MigrateError::io(&baseline_path, e)),
    };

    let Some((index, line)) = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i, l.trim()))
        .find(|(_, l)| !l.is_empty() && !l.starts_with('#'))
    else {
        return Ok(None);
    };

    Version::parse(line)
        .map(Some)
        .ok_or_else(|| MigrateError::Parse {
            path: baseline_path,
            line: index + 1,
            message: format!("invalid baseline version '{}'", line),
        })
}

/// Overwrite the baseline with `version`.
///
/// Written to a sibling temp file first and renamed into place.
pub fn write_baseline(
    migrations_dir: &Path,
    version: Version,
    created: DateTime<Utc>,
    summary: Option<&str>,
) -> Result<()> {
    fs::create_dir_all(migrations_dir).map_err(|e| MigrateError::io(migrations_dir, e))?;

    let baseline_path = migrations_dir.join(BASELINE_FILE);
    let temp_path = migrations_dir.join(format!("{}.tmp", BASELINE_FILE));

    fs::write(&temp_path, render_baseline(version, created, summary))
        .map_err(|e| MigrateError::io(&temp_path, e))?;
    fs::rename(&temp_path, &baseline_path).map_err(|e| MigrateError::io(&baseline_path, e))?;

    tracing::debug!(version = %version, "wrote baseline");
    Ok(())
}

fn render_baseline(version: Version, created: DateTime<Utc>, summary: Option<&str>) -> String {
    let mut content = format!("{}\n# created: {}\n", version, created.to_rfc3339());
    for line in summary.into_iter().flat_map(str::lines) {
        let line = line.trim_end();
        if line.is_empty() {
            content.push_str("#\n");
        } else {
            content.push_str("# ");
            content.push_str(line);
            content.push('\n');
        }
    }
    content
}

/// Migrations whose version is at or below `baseline`.
pub fn covered_by<'a>(baseline: Version, available: &'a [Migration]) -> Vec<&'a Migration> {
    available
        .iter()
        .filter(|m| m.version <= baseline)
        .collect()
}

/// Delete migration files at or below the baseline version.
///
/// Returns the deleted paths. Files already gone are skipped.
pub fn delete_baselined_migrations(
    baseline: Version,
    available: &[Migration],
) -> Result<Vec<PathBuf>> {
    let mut deleted = Vec::new();

    for migration in covered_by(baseline, available) {
        match fs::remove_file(&migration.file_path) {
            Ok(()) => {
                tracing::debug!(id = %migration.id, "deleted baselined migration file");
                deleted.push(migration.file_path.clone());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(MigrateError::io(&migration.file_path, e)),
        }
    }

    Ok(deleted)
}
