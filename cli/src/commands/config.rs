// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use sharefs_core::domain::stack_config::StackConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./sharefs.yaml)
        #[arg(short, long, default_value = "./sharefs.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(&output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, yaml: bool) -> Result<()> {
    let config = StackConfig::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Stack manifest lookup:".bold());
        match &config_override {
            Some(path) => println!("  --config / SHAREFS_CONFIG_PATH: {}", path.display()),
            None => println!("  --config / SHAREFS_CONFIG_PATH: {}", "(not set)".dimmed()),
        }
        let cwd = std::env::current_dir().context("Failed to read the working directory")?;
        for (index, path) in StackConfig::search_paths(&cwd).iter().enumerate() {
            let marker = if path.is_file() { "found".green() } else { "-".dimmed() };
            println!("  {}. {} {}", index + 1, path.display(), marker);
        }
        println!();
    }

    if yaml {
        let rendered = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        print!("{}", rendered);
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Stack:".bold());
    println!("  Name: {}", config.metadata.name);
    println!("  Account: {}", spec.environment.account);
    println!("  Region: {}", spec.environment.region);
    match &spec.assets.bucket {
        Some(bucket) => println!("  Asset bucket: {}", bucket),
        None => println!("  Asset bucket: {}", "(default)".dimmed()),
    }
    println!("  Log retention: {} days", spec.log_retention_days);
    println!();

    println!("{}", "Network:".bold());
    println!("  ID: {}", spec.network.id);
    for subnet in &spec.network.subnets {
        println!(
            "    - {} ({:?}, {})",
            subnet.id, subnet.subnet_type, subnet.availability_zone
        );
    }
    println!();

    println!("{}", "NFS Servers:".bold());
    for server in &spec.nfs_servers {
        let zone = spec.hosted_zone.as_ref().map(|z| z.name.as_str()).unwrap_or("(no zone)");
        println!("  {} → {}.{}", server.name.bold(), server.hostname, zone);
        println!("    Export path: {}", server.mount.location);
        for share in &server.shares {
            println!("      - {}", share.client);
        }
    }
    println!();

    println!("{}", "Lustre Filesystems:".bold());
    for lustre in &spec.lustre_filesystems {
        println!("  {} ({})", lustre.name.bold(), lustre.file_system_id);
    }
    println!();

    println!("{}", "Instances:".bold());
    for instance in &spec.instances {
        println!("  {} ({})", instance.name.bold(), instance.os);
        for mount in &instance.mounts {
            println!("    - {} at {}", mount.filesystem, mount.mount.location);
        }
    }
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = StackConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/stack-with-examples.yaml")
    } else {
        include_str!("../../templates/stack-minimal.yaml")
    };

    std::fs::write(output, sample).with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_manifests_are_valid() {
        for sample in [
            include_str!("../../templates/stack-minimal.yaml"),
            include_str!("../../templates/stack-with-examples.yaml"),
        ] {
            let config = StackConfig::from_yaml_str(sample).unwrap();
            config.validate().unwrap();
        }
    }

    #[tokio::test]
    async fn test_generate_writes_sample() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("sharefs.yaml");

        generate(&output, false).await.unwrap();

        let written = std::fs::read_to_string(&output).unwrap();
        assert!(written.contains("apiVersion: sharefs.io/v1"));
    }
}
