//! xtask - Build tasks for migrate
//!
//! Run with: cargo xtask <command>
//!
//! Commands:
//! - gen-docs: Generate documentation (man pages, COMMANDS.md)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, Command, CommandFactory, Parser, Subcommand};

use migrate::cli::Cli;

const BIN_NAME: &str = "migrate";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build tasks for migrate")]
struct Xtask {
    #[command(subcommand)]
    command: XtaskCommand,
}

#[derive(Subcommand)]
enum XtaskCommand {
    /// Generate documentation from CLI definitions
    #[command(name = "gen-docs")]
    GenDocs {
        /// Output directory (default: docs/)
        #[arg(long, short, default_value = "docs")]
        output: PathBuf,

        /// Generate man pages
        #[arg(long)]
        man: bool,

        /// Generate COMMANDS.md
        #[arg(long)]
        markdown: bool,
    },
}

fn main() -> Result<()> {
    let args = Xtask::parse();

    match args.command {
        XtaskCommand::GenDocs {
            output,
            man,
            markdown,
        } => {
            // If no specific format is specified, generate all
            let gen_all = !man && !markdown;

            if gen_all || man {
                generate_man_pages(&output)?;
            }
            if gen_all || markdown {
                generate_markdown(&output)?;
            }
        }
    }

    Ok(())
}

/// Generate man pages using clap_mangen, one per visible (sub)command
fn generate_man_pages(output: &Path) -> Result<()> {
    let man_dir = output.join("man");
    fs::create_dir_all(&man_dir).context("Failed to create man directory")?;

    let cmd = Cli::command();
    write_man_page(&man_dir, BIN_NAME, &cmd)?;

    for subcommand in visible_subcommands(&cmd) {
        let name = format!("{}-{}", BIN_NAME, subcommand.get_name());
        write_man_page(&man_dir, &name, subcommand)?;

        for nested in visible_subcommands(subcommand) {
            let nested_name = format!("{}-{}", name, nested.get_name());
            write_man_page(&man_dir, &nested_name, nested)?;
        }
    }

    println!("Man pages generated in {}", man_dir.display());
    Ok(())
}

fn write_man_page(man_dir: &Path, name: &str, cmd: &Command) -> Result<()> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd.clone()).render(&mut buffer)?;
    let path = man_dir.join(format!("{}.1", name));
    fs::write(&path, buffer).with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Generated: {}", path.display());
    Ok(())
}

/// Generate COMMANDS.md markdown documentation
fn generate_markdown(output: &Path) -> Result<()> {
    fs::create_dir_all(output).context("Failed to create output directory")?;

    let cmd = Cli::command();
    let mut markdown = String::new();

    markdown.push_str("# migrate Command Reference\n\n");
    markdown.push_str("This document is auto-generated from the CLI definitions.\n\n");
    markdown.push_str("## Table of Contents\n\n");
    for subcommand in visible_subcommands(&cmd) {
        let name = subcommand.get_name();
        markdown.push_str(&format!("- [{}](#{}-{})\n", name, BIN_NAME, name));
    }
    markdown.push_str("\n---\n\n");

    markdown.push_str(&format!("## {}\n\n", BIN_NAME));
    if let Some(about) = cmd.get_about() {
        markdown.push_str(&format!("{}\n\n", about));
    }
    push_global_options(&mut markdown, &cmd);
    push_code_block(&mut markdown, cmd.get_long_about());

    for subcommand in visible_subcommands(&cmd) {
        let name = subcommand.get_name();
        markdown.push_str(&format!("## {} {}\n\n", BIN_NAME, name));
        if let Some(about) = subcommand.get_about() {
            markdown.push_str(&format!("{}\n\n", about));
        }

        push_arguments(&mut markdown, subcommand, "###");

        if subcommand.get_long_about().is_some() {
            markdown.push_str("### Description\n\n");
            push_code_block(&mut markdown, subcommand.get_long_about());
        }

        let nested: Vec<_> = visible_subcommands(subcommand).collect();
        if !nested.is_empty() {
            markdown.push_str("### Subcommands\n\n");
            for nested_cmd in nested {
                markdown.push_str(&format!(
                    "#### {} {} {}\n\n",
                    BIN_NAME,
                    name,
                    nested_cmd.get_name()
                ));
                if let Some(about) = nested_cmd.get_about() {
                    markdown.push_str(&format!("{}\n\n", about));
                }
                push_arguments(&mut markdown, nested_cmd, "#####");
                push_code_block(&mut markdown, nested_cmd.get_long_about());
            }
        }

        markdown.push_str("---\n\n");
    }

    markdown.push_str("\n*Generated by `cargo xtask gen-docs`*\n");

    let output_path = output.join("COMMANDS.md");
    fs::write(&output_path, markdown)?;
    println!("Generated: {}", output_path.display());

    Ok(())
}

fn visible_subcommands(cmd: &Command) -> impl Iterator<Item = &Command> {
    cmd.get_subcommands().filter(|c| !c.is_hide_set())
}

fn is_builtin(arg: &Arg) -> bool {
    matches!(arg.get_id().as_str(), "help" | "version")
}

/// Options declared `global` on the root command, listed once.
fn push_global_options(markdown: &mut String, cmd: &Command) {
    let globals: Vec<_> = cmd
        .get_arguments()
        .filter(|a| a.is_global_set() && !is_builtin(a))
        .collect();
    if globals.is_empty() {
        return;
    }
    markdown.push_str("### Global Options\n\n");
    for arg in globals {
        push_option(markdown, arg);
    }
    markdown.push('\n');
}

/// Positional arguments and options local to a command.
fn push_arguments(markdown: &mut String, cmd: &Command, heading: &str) {
    let args: Vec<_> = cmd
        .get_arguments()
        .filter(|a| !is_builtin(a) && !a.is_global_set())
        .collect();

    let positional: Vec<_> = args.iter().filter(|a| a.is_positional()).collect();
    if !positional.is_empty() {
        markdown.push_str(&format!("{} Arguments\n\n", heading));
        for arg in positional {
            markdown.push_str(&format!(
                "- `<{}>`: ",
                arg.get_id().as_str().to_uppercase()
            ));
            if let Some(help) = arg.get_help() {
                markdown.push_str(&help.to_string());
            }
            markdown.push('\n');
        }
        markdown.push('\n');
    }

    let options: Vec<_> = args.iter().filter(|a| !a.is_positional()).collect();
    if !options.is_empty() {
        markdown.push_str(&format!("{} Options\n\n", heading));
        for arg in options {
            push_option(markdown, arg);
        }
        markdown.push('\n');
    }
}

fn push_option(markdown: &mut String, arg: &Arg) {
    let long = arg.get_long().map(|l| format!("--{}", l));
    let short = arg.get_short().map(|s| format!("-{}", s));
    let flag = match (long, short) {
        (Some(l), Some(s)) => format!("{}, {}", s, l),
        (Some(l), None) => l,
        (None, Some(s)) => s,
        _ => return,
    };
    markdown.push_str(&format!("- `{}`: ", flag));
    if let Some(help) = arg.get_help() {
        markdown.push_str(&help.to_string());
    }
    markdown.push('\n');
}

fn push_code_block(markdown: &mut String, text: Option<&clap::builder::StyledStr>) {
    if let Some(text) = text {
        markdown.push_str("```\n");
        markdown.push_str(&format!("{}\n", text));
        markdown.push_str("```\n\n");
    }
}
