// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mountable Filesystem
//!
//! The one contract shared by every filesystem backend: given a target
//! instance and a mount specification, make the target mount the filesystem
//! at boot.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Backend-independent mount capability

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::asset::AssetError;
use crate::domain::instance::{InstanceId, OsType};
use crate::domain::lustre::InstallerError;
use crate::domain::mount::MountSpec;
use crate::domain::stack::{Stack, StackError};

#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("Unsupported platform: instance '{instance}' runs {os}, only Linux targets can mount {kind}")]
    UnsupportedPlatform {
        instance: String,
        os: OsType,
        kind: FilesystemKind,
    },

    #[error("Instance '{instance}' declares no Linux distribution, cannot install the {kind} client")]
    UnknownDistribution {
        instance: String,
        kind: FilesystemKind,
    },

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Installer(#[from] InstallerError),
}

/// The closed set of backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilesystemKind {
    SelfHostedNfs,
    ManagedLustre,
}

impl std::fmt::Display for FilesystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SelfHostedNfs => f.write_str("NFS"),
            Self::ManagedLustre => f.write_str("Lustre"),
        }
    }
}

/// A filesystem that Linux instances can mount at boot
pub trait MountableFilesystem {
    fn kind(&self) -> FilesystemKind;

    /// Make `target` mount this filesystem according to `mount`.
    ///
    /// Fails with [`FilesystemError::UnsupportedPlatform`] for non-Linux
    /// targets, in which case neither the target's boot script nor the
    /// network policy has been touched.
    fn mount_to_linux_instance(
        &self,
        stack: &mut Stack,
        target: &InstanceId,
        mount: &MountSpec,
    ) -> Result<(), FilesystemError>;
}

/// Precondition shared by every backend
pub fn require_linux(
    stack: &Stack,
    target: &InstanceId,
    kind: FilesystemKind,
) -> Result<(), FilesystemError> {
    let os = stack.instance(target)?.os_type();
    if os != OsType::Linux {
        return Err(FilesystemError::UnsupportedPlatform {
            instance: target.to_string(),
            os,
            kind,
        });
    }
    Ok(())
}
