//! Advisory lock file for a migrations directory.
//!
//! The engine assumes a single writer per migrations directory. The CLI
//! enforces that with `<migrations>/.lock`, a JSON file holding the owning
//! PID. Locks whose PID is gone are treated as stale and replaced.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the lock file inside the migrations directory.
pub const LOCK_FILE: &str = ".lock";

/// How long an unparsable lock file counts as held.
///
/// A lock is empty between its exclusive create and the write of its body.
const UNPARSABLE_GRACE: Duration = Duration::from_secs(10);

/// Metadata stored in a lock file to identify the owning process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub started: String,
}

/// What a process wanting the lock finds on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No lock file
    Free,
    /// Owned by a live process
    Held(LockInfo),
    /// Present but not (yet) parsable, and recently modified
    Unreadable,
    /// Left by a dead process, or unparsable past the grace period.
    /// Carries the file contents seen.
    Stale(String),
}

/// Holds the lock until dropped.
#[derive(Debug)]
pub struct LockGuard {
    migrations_dir: PathBuf,
    contents: String,
}

impl LockGuard {
    pub fn lock_path(&self) -> PathBuf {
        lock_path_for(&self.migrations_dir)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let lock_path = self.lock_path();
        // Only release a lock that is still ours.
        match fs::read_to_string(&lock_path) {
            Ok(contents) if contents == self.contents => {
                let _ = fs::remove_file(&lock_path);
            }
            Ok(_) => {
                tracing::warn!(path = %lock_path.display(), "lock file replaced while held; leaving it")
            }
            Err(_) => {}
        }
    }
}

/// Get the lock file path for a migrations directory.
pub fn lock_path_for(migrations_dir: &Path) -> PathBuf {
    migrations_dir.join(LOCK_FILE)
}

/// Acquire the lock for a migrations directory.
///
/// Creates the directory if needed. Bails if a live process holds the lock;
/// a stale lock is removed and acquisition retried once.
pub fn acquire(migrations_dir: &Path) -> Result<LockGuard> {
    fs::create_dir_all(migrations_dir).with_context(|| {
        format!(
            "Failed to create migrations directory: {}",
            migrations_dir.display()
        )
    })?;

    check_not_locked(migrations_dir)?;
    let contents = match try_create_lock(migrations_dir)? {
        Some(contents) => contents,
        None => {
            // Lost a race with another process between the check and create.
            check_not_locked(migrations_dir)?;
            try_create_lock(migrations_dir)?.ok_or_else(|| {
                anyhow::anyhow!(
                    "Migrations directory is locked by another process: {}",
                    migrations_dir.display()
                )
            })?
        }
    };

    tracing::debug!(dir = %migrations_dir.display(), "acquired migrations lock");
    Ok(LockGuard {
        migrations_dir: migrations_dir.to_path_buf(),
        contents,
    })
}

/// Create the lock file exclusively.
///
/// Returns `Ok(false)` if a lock file already exists.
pub fn create_lock(migrations_dir: &Path) -> Result<bool> {
    Ok(try_create_lock(migrations_dir)?.is_some())
}

/// Create the lock file exclusively, returning the body written.
fn try_create_lock(migrations_dir: &Path) -> Result<Option<String>> {
    let lock_path = lock_path_for(migrations_dir);
    let info = LockInfo {
        pid: std::process::id(),
        started: chrono::Utc::now().to_rfc3339(),
    };
    let json = serde_json::to_string(&info).context("Failed to serialize lock info")?;

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&lock_path)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))
        }
    };
    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write lock file: {}", lock_path.display()))?;
    Ok(Some(json))
}

/// Inspect the lock file.
pub fn lock_state(migrations_dir: &Path) -> LockState {
    classify(migrations_dir, UNPARSABLE_GRACE)
}

fn classify(migrations_dir: &Path, grace: Duration) -> LockState {
    let lock_path = lock_path_for(migrations_dir);
    let contents = match fs::read_to_string(&lock_path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LockState::Free,
        Err(_) => return LockState::Unreadable,
    };

    match serde_json::from_str::<LockInfo>(&contents) {
        Ok(info) if is_pid_alive(info.pid) => LockState::Held(info),
        Ok(_) => LockState::Stale(contents),
        Err(_) if modified_within(&lock_path, grace) => LockState::Unreadable,
        Err(_) => LockState::Stale(contents),
    }
}

/// True unless the file is known to be older than `window`.
fn modified_within(path: &Path, window: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map_or(true, |age| age < window)
}

/// Read lock info if the lock file exists and the owning PID is still alive.
///
/// Returns `None` if the lock file is missing, malformed, or the PID is dead.
pub fn read_lock(migrations_dir: &Path) -> Option<LockInfo> {
    match lock_state(migrations_dir) {
        LockState::Held(info) => Some(info),
        _ => None,
    }
}

/// Verify that the directory is not locked by a live process.
///
/// Returns `Ok(())` if unlocked or the lock is stale. Auto-cleans stale lock files.
pub fn check_not_locked(migrations_dir: &Path) -> Result<()> {
    match lock_state(migrations_dir) {
        LockState::Free => Ok(()),
        LockState::Held(info) => anyhow::bail!(
            "Migrations directory is locked by process {} (since {}): {}",
            info.pid,
            info.started,
            migrations_dir.display()
        ),
        LockState::Unreadable => anyhow::bail!(
            "Migrations directory is being locked by another process: {}",
            migrations_dir.display()
        ),
        LockState::Stale(contents) => remove_stale_lock(migrations_dir, &contents),
    }
}

/// Remove a stale lock, provided it still holds `expected`.
///
/// The file is moved aside before deletion. If it turns out to be a fresh
/// lock another process created in the meantime, it is linked back.
fn remove_stale_lock(migrations_dir: &Path, expected: &str) -> Result<()> {
    let lock_path = lock_path_for(migrations_dir);
    let aside = migrations_dir.join(format!("{}.stale.{}", LOCK_FILE, std::process::id()));

    match fs::rename(&lock_path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Failed to remove stale lock file: {}", lock_path.display())
            })
        }
    }

    let moved = fs::read_to_string(&aside).unwrap_or_default();
    if moved != expected {
        if let Err(e) = fs::hard_link(&aside, &lock_path) {
            tracing::warn!(path = %lock_path.display(), error = %e, "could not restore lock file");
        }
        let _ = fs::remove_file(&aside);
        anyhow::bail!(
            "Migrations directory was locked concurrently: {}",
            migrations_dir.display()
        );
    }

    tracing::warn!(path = %lock_path.display(), "removing stale lock file");
    let _ = fs::remove_file(&aside);
    Ok(())
}

/// Check whether a process with the given PID is still running.
///
/// Uses `kill(pid, 0)` which checks for process existence without sending a signal.
/// Returns `true` if the process exists (even if owned by another user: EPERM).
#[cfg(unix)]
pub(crate) fn is_pid_alive(pid: u32) -> bool {
    // SAFETY: kill with signal 0 only checks process existence, no signal is sent.
    let ret = unsafe { libc::kill(pid as libc::pid_t, 0) };
    if ret == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub(crate) fn is_pid_alive(_pid: u32) -> bool {
    false
}
