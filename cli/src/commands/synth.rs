// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Synthesis command
//!
//! Loads the stack manifest, declares every construct and writes the cloud
//! assembly to the output directory.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use sharefs_core::application::stack_builder::StackBuilder;
use sharefs_core::domain::asset::AssetCache;
use sharefs_core::domain::stack_config::StackConfig;
use sharefs_core::infrastructure::cloud_assembly::{AssemblyManifest, CloudAssembly};

#[derive(Args)]
pub struct SynthCommand {
    /// Output directory for the cloud assembly
    #[arg(short, long, default_value = "sharefs.out")]
    pub output: PathBuf,

    /// Print the assembly manifest as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(command: SynthCommand, config_override: Option<PathBuf>) -> Result<()> {
    let manifest = synthesize(&command, config_override)?;

    if command.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?
        );
    }
    Ok(())
}

/// Build the configured stack and write its assembly
pub fn synthesize(command: &SynthCommand, config_override: Option<PathBuf>) -> Result<AssemblyManifest> {
    let config = StackConfig::load_or_default(config_override).context("Failed to load configuration")?;
    info!("Synthesizing stack {}", config.metadata.name);

    let built = StackBuilder::new(config, AssetCache::new())
        .build()
        .context("Failed to build stack")?;
    let manifest = CloudAssembly::write(&built.stack, &command.output)
        .with_context(|| format!("Failed to write cloud assembly to {:?}", command.output))?;

    if !command.json {
        println!(
            "{}",
            format!("✓ Synthesized {} into {}", manifest.stack, command.output.display()).green()
        );
        println!("  Template: {}", manifest.template_file);
        println!("  Instances: {}", built.stack.instances().count());
        for asset in &manifest.assets {
            println!("  Asset {}: s3://{}/{}", asset.name.bold(), asset.bucket, asset.object_key);
        }
        for server in &built.nfs_servers {
            println!("  {} ({} exports)", server.full_hostname().bold(), server.exports().len());
            for export in server.exports() {
                println!("    - {} ({})", export.client, export.options.join(","));
            }
        }
    }

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesize_sample_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("sharefs.yaml");
        std::fs::write(&config_path, include_str!("../../templates/stack-with-examples.yaml")).unwrap();

        let command = SynthCommand {
            output: dir.path().join("out"),
            json: true,
        };
        let manifest = synthesize(&command, Some(config_path)).unwrap();

        assert!(dir.path().join("out").join(&manifest.template_file).exists());
        assert_eq!(manifest.assets.len(), 3);
        for asset in &manifest.assets {
            assert!(dir.path().join("out").join(&asset.file).exists());
        }
    }
}
