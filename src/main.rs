//! migrate - CLI entry point

mod commands;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches};
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use migrate::cli::{build_cli_styles, Cli, Commands, ConfigCommands};

/// Version string: the crate version, plus the git SHA for dev builds.
fn version_string() -> &'static str {
    #[cfg(not(feature = "release"))]
    {
        if let Some(sha) = option_env!("VERGEN_GIT_SHA") {
            let version = format!("{} ({})", env!("CARGO_PKG_VERSION"), sha);
            return Box::leak(version.into_boxed_str());
        }
    }
    env!("CARGO_PKG_VERSION")
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins; otherwise `-v` selects debug and `-vv` trace.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("migrate={}", default_level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(Layer::new().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

fn main() -> Result<()> {
    let matches = Cli::command()
        .version(version_string())
        .styles(build_cli_styles())
        .get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(cli.verbose);

    let ctx = commands::Context::resolve(&cli.root, cli.migrations.as_deref())?;

    match cli.command {
        Commands::Status { json } => commands::status::handle(&ctx, json),
        Commands::Up {
            dry_run,
            baseline,
            keep,
            json,
        } => commands::up::handle(&ctx, dry_run, baseline, keep, json),
        Commands::Create {
            name,
            template,
            description,
            list_templates,
        } => {
            if list_templates {
                commands::create::handle_list_templates()
            } else {
                commands::create::handle(
                    &ctx,
                    name.as_deref().unwrap_or_default(),
                    template.as_deref(),
                    description.as_deref(),
                )
            }
        }
        Commands::Baseline {
            version,
            summary,
            dry_run,
            keep,
        } => commands::baseline::handle(&ctx, &version, summary, dry_run, keep),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::handle_show(&ctx),
        },
        Commands::Completions { shell } => commands::completions::handle::<Cli>(shell),
    }
}
