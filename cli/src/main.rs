// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # sharefs CLI
//!
//! The `sharefs` binary turns a stack manifest into a deployable cloud
//! assembly and lets operators inspect the bootstrap scripts it ships.
//!
//! ## Commands
//!
//! - `sharefs config show|validate|generate` - Configuration management
//! - `sharefs synth [-o DIR]` - Build the stack and write the cloud assembly
//! - `sharefs scripts list|show` - Inspect embedded bootstrap scripts

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use sharefs::commands::{self, ConfigCommand, ScriptsCommand, SynthCommand};

/// sharefs - Shared filesystems for cloud stacks
#[derive(Parser)]
#[command(name = "sharefs")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to stack manifest (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SHAREFS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SHAREFS_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Build the stack and write the cloud assembly
    #[command(name = "synth")]
    Synth {
        #[command(flatten)]
        command: SynthCommand,
    },

    /// Inspect embedded bootstrap scripts
    #[command(name = "scripts")]
    Scripts {
        #[command(subcommand)]
        command: ScriptsCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Synth { command }) => commands::synth::execute(command, cli.config).await,
        Some(Commands::Scripts { command }) => commands::scripts::handle_command(command).await,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
