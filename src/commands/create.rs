//! Create command handler

use anyhow::Result;

use migrate::templates::TEMPLATES;

use super::{display_path, Context};

/// Create a new migration file from a template.
///
/// Falls back to the template configured in `migrate.toml`.
#[cfg(not(tarpaulin_include))]
pub fn handle(
    ctx: &Context,
    name: &str,
    template: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let engine = ctx.engine();
    let _lock = ctx.lock(&engine)?;

    let template = template.unwrap_or(ctx.config.migrations.template.as_str());
    let path = engine.create(name, description, template)?;

    println!("Created migration: {}", display_path(&engine, &path));
    Ok(())
}

/// List the built-in templates.
#[cfg(not(tarpaulin_include))]
pub fn handle_list_templates() -> Result<()> {
    println!("Available templates:");
    for template in TEMPLATES {
        println!("  {:<8} {}", template.name, template.extension);
    }
    Ok(())
}
