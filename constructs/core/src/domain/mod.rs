// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod asset;
pub mod filesystem;
pub mod instance;
pub mod lustre;
pub mod mount;
pub mod network;
pub mod path_sanitizer;
pub mod stack;
pub mod stack_config;

pub use asset::{AssetCache, AssetHandle, AssetKey, StackId};
pub use filesystem::{FilesystemError, FilesystemKind, MountableFilesystem};
pub use instance::{InstanceId, InstanceProps, OsType};
pub use mount::{translate, MountPermission, MountSpec};
pub use stack::{Stack, StackEnvironment};
pub use stack_config::{StackConfig, StackConfigManifest};
