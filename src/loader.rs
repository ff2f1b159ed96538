//! Migration discovery.
//!
//! Lists a migrations directory (non-recursively), keeps files whose names
//! parse as `<version>-<name>[.<ext>]`, and returns them in version order.
//! Anything else in the directory is ignored.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{MigrateError, Result};
use crate::version::Version;

/// Number of leading lines searched for a description.
const DESCRIPTION_SCAN_LINES: usize = 20;

/// Metadata for a discovered migration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Migration {
    /// Migration ID: the filename without extension (e.g., "1f72f-init")
    pub id: String,
    /// Version parsed from the filename prefix
    pub version: Version,
    /// Absolute path to the migration file
    pub file_path: PathBuf,
    /// Description extracted from the file header, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Migration {
    /// Filename component of the migration path.
    pub fn filename(&self) -> String {
        self.file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.id.clone())
    }
}

/// List migration files in `dir`, sorted by version then filename.
///
/// A missing directory yields an empty list. Descriptions are not loaded.
/// Two files sharing an id (`001-a.sh`, `001-a.py`) are a conflict.
pub fn list_migration_files(dir: &Path) -> Result<Vec<Migration>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(dir = %dir.display(), "migrations directory does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(MigrateError::Discovery {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    let mut migrations = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MigrateError::Discovery {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match Version::from_filename(filename) {
            Some((version, id)) => migrations.push(Migration {
                id,
                version,
                file_path: path.clone(),
                description: None,
            }),
            None => tracing::trace!(file = filename, "skipping non-migration file"),
        }
    }

    migrations.sort_by(|a, b| {
        a.version
            .cmp(&b.version)
            .then_with(|| a.file_path.file_name().cmp(&b.file_path.file_name()))
    });

    // Same id sorts adjacent: the id carries the version prefix.
    if let Some(pair) = migrations.windows(2).find(|pair| pair[0].id == pair[1].id) {
        return Err(MigrateError::Conflict(format!(
            "Duplicate migration id '{}': {} and {}",
            pair[0].id,
            pair[0].filename(),
            pair[1].filename()
        )));
    }

    Ok(migrations)
}

/// Discover all migrations in `dir` with descriptions loaded.
pub fn discover_migrations(dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = list_migration_files(dir)?;
    for migration in &mut migrations {
        migration.description = read_description(&migration.file_path);
    }
    tracing::debug!(
        dir = %dir.display(),
        count = migrations.len(),
        "discovered migrations"
    );
    Ok(migrations)
}

/// Best-effort description lookup in the head of a migration file.
fn read_description(path: &Path) -> Option<String> {
    let file = fs::File::open(path).ok()?;
    BufReader::new(file)
        .lines()
        .take(DESCRIPTION_SCAN_LINES)
        .map_while(|line| line.ok())
        .find_map(|line| extract_description(&line))
}

/// Extract a description from one line of a migration file.
///
/// Recognizes `Description: <text>` inside a comment and
/// `description = "<text>"` style constants (optionally `export const`).
pub fn extract_description(line: &str) -> Option<String> {
    let trimmed = line.trim();

    let comment_body = ["#!", "#", "//", "--", "/*", "*"]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker));
    if let Some(body) = comment_body {
        let body = body.trim().trim_end_matches("*/").trim();
        if let Some(text) = strip_prefix_ignore_case(body, "description:") {
            return non_empty(text);
        }
        return None;
    }

    let assignment = trimmed
        .strip_prefix("export ")
        .unwrap_or(trimmed)
        .trim_start_matches("const ")
        .trim_start_matches("let ")
        .trim_start_matches("var ");
    let rest = assignment.strip_prefix("description")?.trim_start();
    let rest = rest.strip_prefix(':').map(|r| r.trim_start()).unwrap_or(rest);
    let rest = rest.strip_prefix("string").unwrap_or(rest).trim_start();
    let value = rest.strip_prefix('=')?.trim().trim_end_matches(';').trim();
    let quote = value.chars().next().filter(|c| matches!(c, '"' | '\'' | '`'))?;
    let inner = value[1..].strip_suffix(quote)?;
    non_empty(inner)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &s[prefix.len()..])
}

fn non_empty(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
