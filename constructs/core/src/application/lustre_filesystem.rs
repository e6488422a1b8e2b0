// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Managed Lustre Filesystem
//!
//! References a Lustre filesystem that already exists and mounts it on Linux
//! instances. Nothing about the filesystem itself is declared in the stack.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Lustre variant of [`MountableFilesystem`]

use serde::{Deserialize, Serialize};

use crate::application::lustre_installer::LustreInstaller;
use crate::application::mount_commands::{mount_with_bundle, BundleMount};
use crate::application::ConstructError;
use crate::domain::filesystem::{require_linux, FilesystemError, FilesystemKind, MountableFilesystem};
use crate::domain::instance::InstanceId;
use crate::domain::mount::MountSpec;
use crate::domain::network::{Port, SecurityGroupRef};
use crate::domain::stack::Stack;
use crate::infrastructure::scripts::{ScriptBundle, MOUNT_LUSTRE_SCRIPT};

/// Lustre network port
pub const LUSTRE_PORT: Port = Port::tcp(988);

/// Mount options every Lustre client gets after the permission flag
pub const DEFAULT_LUSTRE_OPTIONS: &[&str] = &["flock"];

/// Identity of an existing Lustre filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LustreAttributes {
    pub name: String,
    pub file_system_id: String,
    pub mount_name: String,
    pub security_group_id: String,
}

#[derive(Debug, Clone)]
pub struct LustreFilesystem {
    attributes: LustreAttributes,
    security_group: SecurityGroupRef,
}

impl LustreFilesystem {
    /// Reference an existing filesystem from its attributes
    pub fn from_attributes(stack: &mut Stack, attributes: LustreAttributes) -> Result<Self, ConstructError> {
        stack.reserve_name(&attributes.name)?;
        let security_group = SecurityGroupRef::Imported(attributes.security_group_id.clone());
        tracing::info!(
            stack = %stack.name(),
            filesystem = %attributes.file_system_id,
            "Referenced Lustre filesystem"
        );

        Ok(Self {
            attributes,
            security_group,
        })
    }

    pub fn name(&self) -> &str {
        &self.attributes.name
    }

    pub fn file_system_id(&self) -> &str {
        &self.attributes.file_system_id
    }

    pub fn mount_name(&self) -> &str {
        &self.attributes.mount_name
    }

    pub fn security_group(&self) -> &SecurityGroupRef {
        &self.security_group
    }
}

impl MountableFilesystem for LustreFilesystem {
    fn kind(&self) -> FilesystemKind {
        FilesystemKind::ManagedLustre
    }

    fn mount_to_linux_instance(
        &self,
        stack: &mut Stack,
        target: &InstanceId,
        mount: &MountSpec,
    ) -> Result<(), FilesystemError> {
        require_linux(stack, target, self.kind())?;
        let distribution = stack
            .instance(target)?
            .distribution()
            .ok_or_else(|| FilesystemError::UnknownDistribution {
                instance: target.to_string(),
                kind: self.kind(),
            })?;
        let install_commands = LustreInstaller::new(distribution)?.install_commands()?;

        mount_with_bundle(
            stack,
            target,
            BundleMount {
                kind: self.kind(),
                bundle: ScriptBundle::LUSTRE,
                script: MOUNT_LUSTRE_SCRIPT,
                args: vec![
                    self.attributes.file_system_id.clone(),
                    mount.location_str(),
                    self.attributes.mount_name.clone(),
                    mount.options_token(DEFAULT_LUSTRE_OPTIONS),
                ],
                install_commands,
                ingress: Some((self.security_group.clone(), LUSTRE_PORT)),
            },
        )?;

        tracing::info!(
            instance = %target,
            filesystem = %self.attributes.file_system_id,
            location = %mount.location().display(),
            "Mounted Lustre filesystem"
        );
        Ok(())
    }
}
