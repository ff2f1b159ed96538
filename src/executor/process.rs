//! Subprocess runner.
//!
//! Executable files are spawned directly (their shebang picks the
//! interpreter). Other files are handed to the interpreter registered for
//! their extension in the template registry. The child runs in the project
//! root, inherits stdout/stderr and receives the context as `MIGRATE_*`
//! environment variables.

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{ExecutionContext, MigrationRunner, RunError, RunResult};
use crate::loader::Migration;
use crate::templates::template_for_extension;

/// Attempts made when the kernel reports the script as busy.
const SPAWN_ATTEMPTS: u32 = 5;

/// Runs migrations as external processes.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    /// Kill the migration after this long. `None` waits forever.
    timeout: Option<Duration>,
}

impl ProcessRunner {
    /// Create a runner without a timeout.
    pub fn new() -> Self {
        Self { timeout: None }
    }

    /// Create a runner that kills migrations running longer than `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Build the command for a migration file.
    fn command_for(path: &Path) -> Result<Command, RunError> {
        if is_executable(path) {
            return Ok(Command::new(path));
        }

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let template = template_for_extension(extension).ok_or_else(|| {
            RunError::NoInterpreter(
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            )
        })?;

        let (program, args) = template
            .interpreter
            .split_first()
            .ok_or_else(|| RunError::NoInterpreter(extension.to_string()))?;
        let mut cmd = Command::new(program);
        cmd.args(args.iter());
        cmd.arg(path);
        Ok(cmd)
    }
}

impl MigrationRunner for ProcessRunner {
    fn name(&self) -> &'static str {
        "process"
    }

    fn run(&self, migration: &Migration, ctx: &ExecutionContext) -> RunResult {
        let mut cmd = Self::command_for(&migration.file_path)?;
        cmd.current_dir(&ctx.project_root);
        cmd.envs(ctx.env_vars());
        cmd.stdin(Stdio::null());

        let program = cmd.get_program().to_string_lossy().to_string();
        tracing::trace!(id = %migration.id, program = %program, "spawning migration");

        let mut child = spawn(&mut cmd).map_err(|source| RunError::Spawn { program, source })?;

        let status = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout)?,
            None => child.wait().map_err(RunError::Wait)?,
        };

        exit_status_to_result(status)
    }
}

/// Spawn, retrying briefly on `ETXTBSY`.
///
/// A script that was just written can still be open for writing in a
/// forked sibling process, which makes `execve` fail with "text file busy".
fn spawn(cmd: &mut Command) -> std::io::Result<Child> {
    let mut attempt = 1;
    loop {
        match cmd.spawn() {
            #[cfg(unix)]
            Err(e) if e.raw_os_error() == Some(libc::ETXTBSY) && attempt < SPAWN_ATTEMPTS => {
                attempt += 1;
                thread::sleep(Duration::from_millis(50));
            }
            other => return other,
        }
    }
}

/// Wait for the child, killing it once `timeout` elapses.
///
/// Polls since std::process has no native timeout; the killed child is
/// reaped so it does not linger as a zombie.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RunError> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RunError::Timeout(timeout));
                }
                thread::sleep(poll_interval);
            }
            Err(e) => return Err(RunError::Wait(e)),
        }
    }
}

fn exit_status_to_result(status: ExitStatus) -> RunResult {
    if status.success() {
        return Ok(());
    }
    if let Some(code) = status.code() {
        return Err(RunError::ExitCode(code));
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Err(RunError::Signal(signal));
        }
    }
    Err(RunError::ExitCode(-1))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    false
}
