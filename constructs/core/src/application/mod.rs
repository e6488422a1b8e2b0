// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod block_volume;
pub mod log_shipping;
pub mod lustre_filesystem;
pub mod lustre_installer;
pub mod mount_commands;
pub mod nfs_server;
pub mod stack_builder;

use thiserror::Error;

use crate::domain::asset::AssetError;
use crate::domain::filesystem::FilesystemError;
use crate::domain::lustre::InstallerError;
use crate::domain::mount::MountError;
use crate::domain::network::NetworkError;
use crate::domain::stack::StackError;

/// Failures raised while declaring constructs into a stack
#[derive(Debug, Error)]
pub enum ConstructError {
    #[error("Volume {volume_id} is in {volume_zone} but the selected subnet is in {subnet_zone}")]
    VolumeZoneMismatch {
        volume_id: String,
        volume_zone: String,
        subnet_zone: String,
    },

    #[error("Invalid hostname '{0}'")]
    InvalidHostname(String),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Stack(#[from] StackError),

    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error(transparent)]
    Installer(#[from] InstallerError),
}

pub use block_volume::mount_block_volume;
pub use log_shipping::LogShipping;
pub use lustre_filesystem::{LustreAttributes, LustreFilesystem};
pub use lustre_installer::LustreInstaller;
pub use mount_commands::shell_quote;
pub use nfs_server::{ExportRecord, HostedZone, NfsServerInstance, NfsServerProps, VolumeSource};
pub use stack_builder::{BuiltStack, StackBuilder};
