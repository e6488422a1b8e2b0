// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cloud Assembly
//!
//! The synthesis output directory: the rendered template, one archive per
//! staged asset, and a manifest telling an uploader where each archive goes.
//!
//! ```text
//! <out>/
//!   <stack>.template.json
//!   asset.<sha256>.tar
//!   manifest.json
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::stack::Stack;
use crate::infrastructure::cloudformation::CloudFormationTemplate;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    pub name: String,
    pub hash: String,
    /// Archive file name inside the assembly directory
    pub file: String,
    pub bucket: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyManifest {
    pub version: String,
    pub stack: String,
    pub template_file: String,
    pub assets: Vec<AssetEntry>,
}

pub struct CloudAssembly;

impl CloudAssembly {
    /// Write the assembly for `stack` into `out_dir`, creating it if needed
    pub fn write(stack: &Stack, out_dir: impl AsRef<Path>) -> Result<AssemblyManifest> {
        let out_dir = out_dir.as_ref();
        std::fs::create_dir_all(out_dir)
            .with_context(|| format!("Failed to create assembly directory {:?}", out_dir))?;

        let template = CloudFormationTemplate::from_stack(stack);
        let template_file = format!("{}.template.json", stack.name());
        let json = template.to_json_pretty().context("Failed to serialize template")?;
        write_file(&out_dir.join(&template_file), json.as_bytes())?;

        let mut assets = Vec::new();
        for handle in stack.assets() {
            let file = format!("asset.{}.tar", handle.hash);
            write_file(&out_dir.join(&file), &handle.contents)?;
            assets.push(AssetEntry {
                name: handle.name.clone(),
                hash: handle.hash.clone(),
                file,
                bucket: handle.bucket.clone(),
                object_key: handle.object_key.clone(),
            });
        }

        let manifest = AssemblyManifest {
            version: MANIFEST_VERSION.to_string(),
            stack: stack.name().to_string(),
            template_file,
            assets,
        };
        let manifest_json = serde_json::to_string_pretty(&manifest).context("Failed to serialize manifest")?;
        write_file(&out_dir.join(MANIFEST_FILE), manifest_json.as_bytes())?;

        tracing::info!(
            stack = %stack.name(),
            directory = ?out_dir,
            resources = template.resource_count(),
            assets = manifest.assets.len(),
            "Wrote cloud assembly"
        );
        Ok(manifest)
    }

    pub fn read_manifest(dir: impl AsRef<Path>) -> Result<AssemblyManifest> {
        let path: PathBuf = dir.as_ref().join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid assembly manifest {:?}", path))
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {:?}", path))
}
