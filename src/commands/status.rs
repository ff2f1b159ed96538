//! Status command handler

use anyhow::{Context as _, Result};
use std::fmt::Write;

use migrate::MigrationState;

use super::Context;

/// Display applied and pending migrations.
#[cfg(not(tarpaulin_include))]
pub fn handle(ctx: &Context, json: bool) -> Result<()> {
    let engine = ctx.engine();
    let state = engine.status()?;

    if json {
        let out = serde_json::to_string_pretty(&state).context("Failed to serialize state")?;
        println!("{}", out);
        return Ok(());
    }

    if state.available.is_empty() && state.applied.is_empty() && state.baseline.is_none() {
        println!(
            "No migrations found in: {}",
            engine.migrations_dir().display()
        );
        return Ok(());
    }

    print!("{}", render(&state));
    Ok(())
}

/// Render the state as the human-readable status report.
pub fn render(state: &MigrationState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Migration Status");
    let _ = writeln!(out, "================");
    let _ = writeln!(out);

    if let Some(baseline) = state.baseline {
        let _ = writeln!(out, "Baseline: {}", baseline);
        let _ = writeln!(out);
    }

    let pending = state.pending.len();
    match (state.current_version(), state.target_version()) {
        (Some(current), Some(target)) if pending == 0 && current >= target => {
            let _ = writeln!(out, "Version: {} (up to date)", current);
        }
        (Some(current), Some(target)) => {
            let _ = writeln!(out, "Version: {} -> {} ({} pending)", current, target, pending);
        }
        (None, Some(target)) => {
            let _ = writeln!(out, "Version: (none) -> {} ({} pending)", target, pending);
        }
        (Some(current), None) => {
            let _ = writeln!(out, "Version: {} (up to date, baselined)", current);
        }
        (None, None) => {}
    }
    let _ = writeln!(out);

    if !state.applied.is_empty() {
        let _ = writeln!(out, "Applied ({}):", state.applied.len());
        for record in &state.applied {
            let suffix = if state.is_baselined(record) {
                "  (baseline)"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "  + {}  {}{}",
                record.id,
                record.applied_at.format("%Y-%m-%d %H:%M:%S"),
                suffix
            );
        }
        let _ = writeln!(out);
    }

    if !state.pending.is_empty() {
        let _ = writeln!(out, "Pending ({}):", state.pending.len());
        for migration in &state.pending {
            match &migration.description {
                Some(description) => {
                    let _ = writeln!(out, "  - {}  {}", migration.id, description);
                }
                None => {
                    let _ = writeln!(out, "  - {}", migration.id);
                }
            }
        }
    }

    out
}
