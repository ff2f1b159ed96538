//! Up command handler

use anyhow::{Context as _, Result};

use migrate::{all_succeeded, BaselineOptions, MigrateError, MigrationResult, Version};

use super::{display_path, Context};

/// Apply pending migrations, optionally baselining at the last one.
///
/// Prints every attempted result, then fails with the first failing
/// migration so the process exits non-zero.
#[cfg(not(tarpaulin_include))]
pub fn handle(ctx: &Context, dry_run: bool, baseline: bool, keep: bool, json: bool) -> Result<()> {
    let engine = ctx.engine();
    let _lock = if dry_run {
        None
    } else {
        Some(ctx.lock(&engine)?)
    };

    let results = engine.up(dry_run)?;

    if json {
        let out = serde_json::to_string_pretty(&results).context("Failed to serialize results")?;
        println!("{}", out);
    } else if results.is_empty() {
        println!("No pending migrations.");
    } else {
        println!(
            "{} {} migration(s)...",
            if dry_run { "Would apply" } else { "Applying" },
            results.len()
        );
        println!();
        for result in &results {
            print_result(result);
        }
    }

    if let Some(failed) = results.iter().find(|r| !r.success) {
        return Err(MigrateError::Execution {
            id: failed.id.clone(),
            message: failed.error.clone().unwrap_or_default(),
        }
        .into());
    }

    if !json && !results.is_empty() {
        println!();
        println!(
            "{}",
            if dry_run {
                "Dry run complete."
            } else {
                "All migrations applied successfully."
            }
        );
    }

    if baseline && all_succeeded(&results) {
        if let Some(version) = last_version(&results) {
            let summary = engine.baseline(
                &version.to_string(),
                BaselineOptions {
                    keep_files: keep,
                    dry_run,
                    summary: None,
                },
            )?;
            if !json {
                println!();
                println!(
                    "{} baseline at version '{}'",
                    if dry_run { "Would create" } else { "Created" },
                    summary.version
                );
                for path in &summary.deleted {
                    println!(
                        "  {} {}",
                        if dry_run { "would delete" } else { "deleted" },
                        display_path(&engine, path)
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_result(result: &MigrationResult) {
    println!("→ {}", result.id);
    if result.dry_run {
        println!("  (dry run - skipped)");
    } else if result.success {
        println!("  ✓ completed");
    } else {
        println!("  ✗ failed");
        if let Some(error) = &result.error {
            println!("    {}", error);
        }
    }
}

/// Version of the newest migration in the results.
fn last_version(results: &[MigrationResult]) -> Option<Version> {
    results
        .iter()
        .filter_map(|r| Version::from_filename(&r.id).map(|(version, _)| version))
        .max()
}
