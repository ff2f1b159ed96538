//! Baseline command handler

use anyhow::Result;

use migrate::BaselineOptions;

use super::{display_path, Context};

/// Record a baseline and report what was (or would be) removed.
#[cfg(not(tarpaulin_include))]
pub fn handle(
    ctx: &Context,
    version: &str,
    summary: Option<String>,
    dry_run: bool,
    keep: bool,
) -> Result<()> {
    let engine = ctx.engine();
    let _lock = if dry_run {
        None
    } else {
        Some(ctx.lock(&engine)?)
    };

    let summary = engine.baseline(
        version,
        BaselineOptions {
            keep_files: keep,
            dry_run,
            summary,
        },
    )?;

    if dry_run {
        println!("Dry run - no changes will be made");
        println!();
    }

    println!(
        "{} baseline at version '{}'",
        if dry_run { "Would create" } else { "Created" },
        summary.version
    );

    if !summary.absorbed.is_empty() {
        println!();
        println!(
            "{} migration(s) not in history now count as applied:",
            summary.absorbed.len()
        );
        for id in &summary.absorbed {
            println!("  - {}", id);
        }
    }

    if keep {
        println!();
        println!("Keeping migration files (--keep flag)");
    } else if !summary.deleted.is_empty() {
        println!();
        println!(
            "{} {} migration file(s):",
            if dry_run { "Would delete" } else { "Deleted" },
            summary.deleted.len()
        );
        for path in &summary.deleted {
            println!("  - {}", display_path(&engine, path));
        }
    }

    Ok(())
}
