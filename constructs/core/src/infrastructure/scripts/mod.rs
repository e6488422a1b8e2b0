// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bootstrap Script Bundles
//!
//! The shell scripts shipped to instances are embedded at compile time and
//! packaged into deterministic tar archives. Identical bundles always hash to
//! the same content address, so a re-synthesis never produces a new upload.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Embed, package and content-address boot-time scripts

use sha2::{Digest, Sha256};

use crate::domain::asset::{AssetError, AssetHandle, AssetKey};

/// One script embedded in a bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedScript {
    pub file_name: &'static str,
    pub contents: &'static str,
}

/// A fixed set of scripts uploaded together
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptBundle {
    name: &'static str,
    scripts: &'static [EmbeddedScript],
}

pub const MOUNT_NFS_SCRIPT: &str = "mount-nfs.sh";
pub const EXPORT_NFS_SCRIPT: &str = "export-nfs.sh";
pub const MOUNT_LUSTRE_SCRIPT: &str = "mount-lustre.sh";
pub const MOUNT_EBS_SCRIPT: &str = "mount-ebs.sh";

const NFS_SCRIPTS: &[EmbeddedScript] = &[
    EmbeddedScript {
        file_name: EXPORT_NFS_SCRIPT,
        contents: include_str!("nfs/export-nfs.sh"),
    },
    EmbeddedScript {
        file_name: MOUNT_NFS_SCRIPT,
        contents: include_str!("nfs/mount-nfs.sh"),
    },
];

const LUSTRE_SCRIPTS: &[EmbeddedScript] = &[EmbeddedScript {
    file_name: MOUNT_LUSTRE_SCRIPT,
    contents: include_str!("lustre/mount-lustre.sh"),
}];

const EBS_SCRIPTS: &[EmbeddedScript] = &[EmbeddedScript {
    file_name: MOUNT_EBS_SCRIPT,
    contents: include_str!("ebs/mount-ebs.sh"),
}];

impl ScriptBundle {
    /// Server export script and client mount script for NFS
    pub const NFS: ScriptBundle = ScriptBundle {
        name: "nfs",
        scripts: NFS_SCRIPTS,
    };

    /// Client mount script for managed Lustre
    pub const LUSTRE: ScriptBundle = ScriptBundle {
        name: "lustre",
        scripts: LUSTRE_SCRIPTS,
    };

    /// Block-volume attach/format/mount script
    pub const EBS: ScriptBundle = ScriptBundle {
        name: "ebs",
        scripts: EBS_SCRIPTS,
    };

    pub fn all() -> [ScriptBundle; 3] {
        [Self::NFS, Self::LUSTRE, Self::EBS]
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key(&self) -> AssetKey {
        AssetKey::derive(self.name)
    }

    pub fn scripts(&self) -> &'static [EmbeddedScript] {
        self.scripts
    }

    pub fn script(&self, file_name: &str) -> Option<&'static EmbeddedScript> {
        self.scripts.iter().find(|s| s.file_name == file_name)
    }

    /// Look a script up across every bundle
    pub fn find_script(file_name: &str) -> Option<(ScriptBundle, &'static EmbeddedScript)> {
        Self::all()
            .into_iter()
            .find_map(|bundle| bundle.script(file_name).map(|script| (bundle, script)))
    }

    /// Build the tar archive. Entries are written in declaration order with
    /// fixed ownership, mode and mtime so the bytes only depend on content.
    pub fn archive(&self) -> Result<Vec<u8>, AssetError> {
        let mut builder = tar::Builder::new(Vec::new());

        for script in self.scripts {
            let mut header = tar::Header::new_gnu();
            header.set_path(script.file_name).map_err(|e| self.packaging_error(e))?;
            header.set_size(script.contents.len() as u64);
            header.set_mode(0o755);
            header.set_uid(0);
            header.set_gid(0);
            header.set_mtime(0);
            header.set_cksum();
            builder
                .append(&header, script.contents.as_bytes())
                .map_err(|e| self.packaging_error(e))?;
        }

        builder.into_inner().map_err(|e| self.packaging_error(e))
    }

    /// Package into an asset handle addressed by content hash
    pub fn package(&self, bucket: &str) -> Result<AssetHandle, AssetError> {
        if bucket.is_empty() || bucket.contains('/') {
            return Err(AssetError::InvalidBucket(bucket.to_string()));
        }

        let contents = self.archive()?;
        let hash = hex::encode(Sha256::digest(&contents));
        tracing::info!(bundle = %self.name, hash = %hash, "Packaged script bundle");

        Ok(AssetHandle {
            key: self.key(),
            name: self.name.to_string(),
            object_key: format!("{}.tar", hash),
            hash,
            bucket: bucket.to_string(),
            contents,
        })
    }

    fn packaging_error(&self, error: std::io::Error) -> AssetError {
        AssetError::Packaging {
            name: self.name.to_string(),
            reason: error.to_string(),
        }
    }
}
