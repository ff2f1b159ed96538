//! Config subcommands handler

use anyhow::Result;

use migrate::Config;

use super::Context;

/// Show the effective configuration as TOML.
#[cfg(not(tarpaulin_include))]
pub fn handle_show(ctx: &Context) -> Result<()> {
    let path = Config::config_path(&ctx.project_root);
    if path.exists() {
        println!("# {}", path.display());
    } else {
        println!("# {} not found, showing defaults", path.display());
    }
    print!("{}", ctx.config.to_toml()?);
    Ok(())
}
