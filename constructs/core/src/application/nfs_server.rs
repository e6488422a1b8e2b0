// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! NFS Server Instance
//!
//! A single instance serving one block volume over NFS 4.1. Construction
//! declares the instance, its volume, a DNS name and log shipping, and lays
//! down the server's boot script. Clients are authorized afterwards with
//! [`NfsServerInstance::share`] and mount through [`MountableFilesystem`].
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Self-hosted NFS variant of [`MountableFilesystem`]
//!
//! # Boot Sequence
//!
//! 1. strict shell mode and an exit trap signalling the boot status to the
//!    deployment engine
//! 2. log shipping
//! 3. block volume attach/format/mount
//! 4. NFS server install, enable and start
//! 5. NFS scripts downloaded (not run)
//! 6. one export command per [`NfsServerInstance::share`] call

use serde::{Deserialize, Serialize};

use crate::application::block_volume::mount_block_volume;
use crate::application::log_shipping::LogShipping;
use crate::application::mount_commands::{fetch_commands, invoke_command, mount_with_bundle, stage_bundle, BundleMount};
use crate::application::ConstructError;
use crate::domain::filesystem::{FilesystemError, FilesystemKind, MountableFilesystem};
use crate::domain::instance::{InstanceId, InstanceProps, RootVolume};
use crate::domain::mount::MountSpec;
use crate::domain::network::{Port, SecurityGroupRef, SubnetSelection};
use crate::domain::stack::{BlockVolume, DnsRecord, Stack, VolumeFormat};
use crate::infrastructure::scripts::{ScriptBundle, EXPORT_NFS_SCRIPT, MOUNT_NFS_SCRIPT};

pub const NFS_PORT: Port = Port::tcp(2049);

pub const DEFAULT_INSTANCE_TYPE: &str = "m5.xlarge";
pub const DEFAULT_VOLUME_SIZE_GIB: u32 = 20;
pub const DEFAULT_EXPORT_OPTIONS: &[&str] = &["rw", "sync", "no_subtree_check", "insecure"];

/// Shell variable holding the server's downloaded NFS scripts
const SCRIPTS_DIR_VARIABLE: &str = "NFS_SCRIPTS_DIR";

const NFS_CLIENT_INSTALL: &str =
    "if command -v yum > /dev/null; then yum install -y nfs-utils; else apt-get update && apt-get install -y nfs-common; fi";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    pub id: String,
    pub name: String,
}

/// Where the server's data volume comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSource {
    New { size_gib: u32, encrypted: bool },
    Existing { volume_id: String, availability_zone: String },
}

impl Default for VolumeSource {
    fn default() -> Self {
        Self::New {
            size_gib: DEFAULT_VOLUME_SIZE_GIB,
            encrypted: true,
        }
    }
}

/// One client authorized to mount the export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub client: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NfsServerProps {
    pub name: String,
    pub hostname: String,
    pub zone: HostedZone,
    pub subnets: SubnetSelection,
    /// Where the data volume is mounted on the server, and thus the export path
    pub mount: MountSpec,
    pub volume: VolumeSource,
    pub format: VolumeFormat,
    pub instance_type: Option<String>,
    pub role: Option<String>,
    pub security_groups: Vec<SecurityGroupRef>,
    pub key_name: Option<String>,
    pub log_retention_days: u32,
}

impl NfsServerProps {
    pub fn new(name: impl Into<String>, hostname: impl Into<String>, zone: HostedZone, mount: MountSpec) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            zone,
            subnets: SubnetSelection::default(),
            mount,
            volume: VolumeSource::default(),
            format: VolumeFormat::default(),
            instance_type: None,
            role: None,
            security_groups: Vec::new(),
            key_name: None,
            log_retention_days: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NfsServerInstance {
    name: String,
    instance: InstanceId,
    hostname: String,
    zone_name: String,
    mount: MountSpec,
    volume: BlockVolume,
    exports: Vec<ExportRecord>,
}

impl NfsServerInstance {
    pub fn new(stack: &mut Stack, props: NfsServerProps) -> Result<Self, ConstructError> {
        // Nothing is declared until every input has been checked
        if !valid_hostname(&props.hostname) {
            return Err(ConstructError::InvalidHostname(props.hostname));
        }
        stack.check_name(&props.name)?;
        let subnet = stack.network().first_subnet(&props.subnets)?.clone();

        let volume = match props.volume {
            VolumeSource::New { size_gib, encrypted } => BlockVolume::Declared {
                logical_id: format!("{}Volume", props.name),
                availability_zone: subnet.availability_zone.clone(),
                size_gib,
                encrypted,
            },
            VolumeSource::Existing {
                volume_id,
                availability_zone,
            } => {
                if availability_zone != subnet.availability_zone {
                    return Err(ConstructError::VolumeZoneMismatch {
                        volume_id,
                        volume_zone: availability_zone,
                        subnet_zone: subnet.availability_zone,
                    });
                }
                BlockVolume::Existing {
                    volume_id,
                    availability_zone,
                }
            }
        };

        let bucket = stack.asset_bucket().to_string();
        for bundle in [ScriptBundle::EBS, ScriptBundle::NFS] {
            stack.stage_asset(bundle.key(), || bundle.package(&bucket))?;
        }

        let mut instance_props = InstanceProps::new(props.name.clone(), subnet)
            .instance_type(props.instance_type.unwrap_or_else(|| DEFAULT_INSTANCE_TYPE.to_string()));
        instance_props.root_volume = RootVolume {
            size_gib: 10,
            encrypted: true,
        };
        instance_props.key_name = props.key_name;
        instance_props.security_groups = props.security_groups;
        instance_props.role = props.role;
        let instance = stack.add_instance(instance_props)?;

        stack.add_block_volume(volume.clone());
        let dns = DnsRecord {
            logical_id: format!("{}DnsRecord", props.name),
            zone_id: props.zone.id.clone(),
            zone_name: props.zone.name.clone(),
            hostname: props.hostname.clone(),
            target: instance.clone(),
        };
        stack.add_dns_record(dns);

        let server = Self {
            name: props.name,
            instance,
            hostname: props.hostname,
            zone_name: props.zone.name,
            mount: props.mount,
            volume,
            exports: Vec::new(),
        };
        server.write_boot_script(stack, props.format, props.log_retention_days)?;

        tracing::info!(
            stack = %stack.name(),
            server = %server.name,
            hostname = %server.full_hostname(),
            "NFS server provisioned"
        );
        Ok(server)
    }

    fn write_boot_script(
        &self,
        stack: &mut Stack,
        format: VolumeFormat,
        log_retention_days: u32,
    ) -> Result<(), ConstructError> {
        let signal = format!(
            "trap '/opt/aws/bin/cfn-signal --stack {} --resource {}Instance --region {} -e $?' EXIT",
            stack.name(),
            self.name,
            stack.environment().region
        );
        stack
            .instance_mut(&self.instance)?
            .user_data_mut()
            .add_commands(["set -xefuo pipefail".to_string(), signal]);

        let shipping = LogShipping::configure(stack, &self.instance, &self.name, log_retention_days)?;
        stack
            .instance_mut(&self.instance)?
            .user_data_mut()
            .add_commands(shipping.commands());

        mount_block_volume(stack, &self.instance, &self.volume, format, &self.mount)?;

        let scripts = stage_bundle(stack, &self.instance, ScriptBundle::NFS)?;
        let user_data = stack.instance_mut(&self.instance)?.user_data_mut();
        user_data.add_commands([
            "yum install -y nfs-utils",
            "systemctl enable nfs-server",
            "systemctl start nfs-server",
        ]);
        user_data.add_commands(fetch_commands(&scripts, SCRIPTS_DIR_VARIABLE));
        Ok(())
    }

    /// Authorize `client` with the default export options
    pub fn share(&mut self, stack: &mut Stack, client: &str) -> Result<(), ConstructError> {
        let options = DEFAULT_EXPORT_OPTIONS.iter().map(|o| o.to_string()).collect();
        self.share_with_options(stack, client, options)
    }

    /// Authorize `client` (a host, wildcard or network pattern). Each call
    /// adds one export; repeated clients are not merged.
    pub fn share_with_options(
        &mut self,
        stack: &mut Stack,
        client: &str,
        options: Vec<String>,
    ) -> Result<(), ConstructError> {
        let script = format!("\"${{{}}}/{}\"", SCRIPTS_DIR_VARIABLE, EXPORT_NFS_SCRIPT);
        let command = invoke_command(
            &script,
            &[self.mount.location_str(), client.to_string(), options.join(",")],
        );
        stack
            .instance_mut(&self.instance)?
            .user_data_mut()
            .add_commands([command]);

        tracing::info!(server = %self.name, client = %client, "Shared export");
        self.exports.push(ExportRecord {
            client: client.to_string(),
            options,
        });
        Ok(())
    }

    /// Add a security group to the server instance
    pub fn add_security_group(&self, stack: &mut Stack, group: SecurityGroupRef) -> Result<(), ConstructError> {
        stack.instance_mut(&self.instance)?.add_security_group(group);
        Ok(())
    }

    pub fn exports(&self) -> &[ExportRecord] {
        &self.exports
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &InstanceId {
        &self.instance
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn full_hostname(&self) -> String {
        format!("{}.{}", self.hostname, self.zone_name)
    }

    pub fn port(&self) -> Port {
        NFS_PORT
    }

    pub fn mount(&self) -> &MountSpec {
        &self.mount
    }

    pub fn volume(&self) -> &BlockVolume {
        &self.volume
    }
}

impl MountableFilesystem for NfsServerInstance {
    fn kind(&self) -> FilesystemKind {
        FilesystemKind::SelfHostedNfs
    }

    fn mount_to_linux_instance(
        &self,
        stack: &mut Stack,
        target: &InstanceId,
        mount: &MountSpec,
    ) -> Result<(), FilesystemError> {
        let destination = stack.instance(&self.instance)?.network_identity().clone();

        mount_with_bundle(
            stack,
            target,
            BundleMount {
                kind: self.kind(),
                bundle: ScriptBundle::NFS,
                script: MOUNT_NFS_SCRIPT,
                args: vec![
                    self.full_hostname(),
                    self.mount.location_str(),
                    mount.location_str(),
                    mount.options_token(&[]),
                ],
                install_commands: vec![NFS_CLIENT_INSTALL.to_string()],
                ingress: Some((destination, NFS_PORT)),
            },
        )?;

        tracing::info!(
            instance = %target,
            server = %self.full_hostname(),
            location = %mount.location().display(),
            "Mounted NFS filesystem"
        );
        Ok(())
    }
}

fn valid_hostname(hostname: &str) -> bool {
    !hostname.is_empty()
        && hostname.len() <= 63
        && hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !hostname.starts_with('-')
        && !hostname.ends_with('-')
}
