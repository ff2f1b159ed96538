//! Completions command handler

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::{generate, Shell as CompletionShell};
use std::io;

/// Generate a shell completion script on stdout.
#[cfg(not(tarpaulin_include))]
pub fn handle<C: CommandFactory>(shell: CompletionShell) -> Result<()> {
    let mut cmd = C::command();
    generate(shell, &mut cmd, "migrate", &mut io::stdout());
    Ok(())
}
