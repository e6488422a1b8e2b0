// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Bootstrap script inspection
//!
//! Commands: list, show

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use sharefs_core::infrastructure::scripts::ScriptBundle;

#[derive(Subcommand)]
pub enum ScriptsCommand {
    /// List every embedded script by bundle
    List,

    /// Print an embedded script
    Show {
        /// Script file name (e.g. mount-nfs.sh)
        #[arg(value_name = "NAME")]
        name: String,
    },
}

pub async fn handle_command(command: ScriptsCommand) -> Result<()> {
    match command {
        ScriptsCommand::List => {
            for bundle in ScriptBundle::all() {
                println!("{}", bundle.name().bold());
                for script in bundle.scripts() {
                    println!("  {} ({} bytes)", script.file_name, script.contents.len());
                }
            }
            Ok(())
        }
        ScriptsCommand::Show { name } => {
            let (_, script) = ScriptBundle::find_script(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown script '{}'. Use `sharefs scripts list`.", name))?;
            print!("{}", script.contents);
            Ok(())
        }
    }
}
