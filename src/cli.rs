//! CLI definitions for migrate
//!
//! This module contains the clap CLI structure definitions, separated from main.rs
//! so they can be accessed by xtask for documentation generation (man pages, markdown).

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell as CompletionShell;
use std::path::PathBuf;

/// Build clap styles.
///
/// - Green: headers, usage, command names
/// - White: descriptions, placeholders (renders as light gray on dark terminals)
pub fn build_cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Green.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::White.on_default())
        .valid(AnsiColor::White.on_default())
        .invalid(AnsiColor::Red.on_default())
        .error(AnsiColor::Red.on_default() | Effects::BOLD)
}

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Apply ordered filesystem migrations to a project")]
#[command(
    long_about = "migrate - Apply ordered filesystem migrations to a project.

Each migration is an executable file in the migrations directory whose name
starts with a version prefix (e.g. 001-init.sh or 1f72f-init.sh). Applied
migrations are recorded in migrations/.history so running `up` again only
applies what is new.

QUICK START:
    migrate create add-config          Create a new bash migration
    migrate status                     Show applied and pending migrations
    migrate up                         Apply pending migrations
    migrate up --dry-run               Preview without running anything
    migrate baseline 1f72f             Mark old migrations as applied"
)]
#[command(version)]
pub struct Cli {
    /// Project root directory
    #[arg(long, short, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Migrations directory, relative to the project root
    #[arg(long, short, global = true)]
    pub migrations: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show applied and pending migrations
    #[command(long_about = "Show the applied/pending state of the migrations directory.

Lists every applied migration with the time it ran, every pending migration
in the order it will run, and the baseline if one was recorded.

EXAMPLES:
    migrate status
    migrate status --json")]
    Status {
        /// Print the state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply pending migrations
    #[command(long_about = "Apply pending migrations in version order.

Stops at the first failing migration. Migrations that succeeded before the
failure stay recorded in history; the failed one and everything after it
remain pending.

EXAMPLES:
    migrate up                         Apply everything pending
    migrate up --dry-run               Show what would run
    migrate up --baseline              Apply, then baseline at the last one")]
    Up {
        /// Show what would run without executing anything
        #[arg(long)]
        dry_run: bool,
        /// Create a baseline at the last applied version afterwards
        #[arg(long)]
        baseline: bool,
        /// Keep migration files when using --baseline
        #[arg(long, requires = "baseline")]
        keep: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new migration file
    #[command(long_about = "Create a new migration file from a template.

The name is sanitized (lowercase, spaces become dashes, other symbols are
dropped) and prefixed with the next free version.

EXAMPLES:
    migrate create add-config
    migrate create \"Rename old files\" -t python -d \"Move legacy assets\"
    migrate create --list-templates")]
    Create {
        /// Migration name
        #[arg(required_unless_present = "list_templates")]
        name: Option<String>,
        /// Template to use (default from migrate.toml, else bash)
        #[arg(long, short)]
        template: Option<String>,
        /// Description written into the new file
        #[arg(long, short)]
        description: Option<String>,
        /// List available templates and exit
        #[arg(long)]
        list_templates: bool,
    },

    /// Mark migrations up to a version as applied
    #[command(long_about = "Record a baseline version.

Every migration at or below the baseline counts as applied, whether or not
history mentions it. Their files are deleted unless --keep is given.
History itself is never rewritten.

EXAMPLES:
    migrate baseline 1f72f
    migrate baseline 004 --keep
    migrate baseline 1f72f --dry-run")]
    Baseline {
        /// Version to baseline at (e.g. 004 or 1f72f)
        version: String,
        /// Note on what the baseline squashes, kept in the .baseline file
        #[arg(short = 's', long)]
        summary: Option<String>,
        /// Show what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Keep migration files instead of deleting them
        #[arg(long)]
        keep: bool,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(long, value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration as TOML
    #[command(long_about = "Display the effective configuration in TOML format.

Reads migrate.toml from the project root and fills in defaults for
anything it does not set.

EXAMPLE:
    migrate config show")]
    Show,
}
