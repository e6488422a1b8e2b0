// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stack Builder
//!
//! Turns a validated [`StackConfig`] into a populated [`Stack`]: Lustre
//! references first, then NFS servers and their exports, then client
//! instances and their mounts.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Configuration-driven construct assembly

use anyhow::{Context, Result};

use crate::application::lustre_filesystem::{LustreAttributes, LustreFilesystem};
use crate::application::nfs_server::{HostedZone, NfsServerInstance, NfsServerProps, VolumeSource, DEFAULT_VOLUME_SIZE_GIB};
use crate::domain::asset::AssetCache;
use crate::domain::filesystem::MountableFilesystem;
use crate::domain::instance::{InstanceId, InstanceProps};
use crate::domain::mount::MountSpec;
use crate::domain::network::SecurityGroupRef;
use crate::domain::stack::{Stack, StackEnvironment};
use crate::domain::stack_config::{MountConfig, NfsServerConfig, StackConfig};

/// A stack plus handles to the constructs declared in it
pub struct BuiltStack {
    pub stack: Stack,
    pub nfs_servers: Vec<NfsServerInstance>,
    pub lustre_filesystems: Vec<LustreFilesystem>,
    pub instances: Vec<InstanceId>,
}

pub struct StackBuilder {
    config: StackConfig,
    asset_cache: AssetCache,
}

impl StackBuilder {
    pub fn new(config: StackConfig, asset_cache: AssetCache) -> Self {
        Self { config, asset_cache }
    }

    pub fn build(&self) -> Result<BuiltStack> {
        self.config.validate().context("Invalid stack configuration")?;
        let spec = &self.config.spec;

        let environment = StackEnvironment::new(&spec.environment.account, &spec.environment.region);
        let mut stack = Stack::new(
            &self.config.metadata.name,
            environment,
            spec.network.clone(),
            self.asset_cache.clone(),
        )
        .with_context(|| format!("Failed to create stack '{}'", self.config.metadata.name))?;
        if let Some(bucket) = &spec.assets.bucket {
            stack = stack.with_asset_bucket(bucket);
        }

        let mut built = BuiltStack {
            stack,
            nfs_servers: Vec::new(),
            lustre_filesystems: Vec::new(),
            instances: Vec::new(),
        };

        for lustre in &spec.lustre_filesystems {
            let attributes = LustreAttributes {
                name: lustre.name.clone(),
                file_system_id: lustre.file_system_id.clone(),
                mount_name: lustre.mount_name.clone(),
                security_group_id: lustre.security_group_id.clone(),
            };
            let filesystem = LustreFilesystem::from_attributes(&mut built.stack, attributes)
                .with_context(|| format!("Failed to reference Lustre filesystem '{}'", lustre.name))?;
            built.lustre_filesystems.push(filesystem);
        }

        for server_config in &spec.nfs_servers {
            let server = self
                .build_nfs_server(&mut built.stack, server_config)
                .with_context(|| format!("Failed to declare NFS server '{}'", server_config.name))?;
            built.nfs_servers.push(server);
        }

        for instance_config in &spec.instances {
            let subnet = built
                .stack
                .network()
                .first_subnet(&instance_config.subnets)
                .with_context(|| format!("Failed to place instance '{}'", instance_config.name))?
                .clone();
            let mut props = InstanceProps::new(&instance_config.name, subnet).os(instance_config.os);
            if let Some(instance_type) = &instance_config.instance_type {
                props = props.instance_type(instance_type);
            }
            if let Some(distribution) = instance_config.distribution {
                props = props.distribution(distribution);
            }
            props.key_name = instance_config.key_name.clone();

            let id = built
                .stack
                .add_instance(props)
                .with_context(|| format!("Failed to declare instance '{}'", instance_config.name))?;

            for mount_config in &instance_config.mounts {
                let mount = mount_spec(&mount_config.mount)?;
                mount_on(&mut built, &mount_config.filesystem, &id, &mount)?;
            }

            built.instances.push(id);
        }

        tracing::info!(
            stack = %built.stack.name(),
            instances = built.stack.instances().count(),
            assets = built.stack.assets().count(),
            "Built stack"
        );
        Ok(built)
    }

    fn build_nfs_server(&self, stack: &mut Stack, config: &NfsServerConfig) -> Result<NfsServerInstance> {
        let zone = self
            .config
            .spec
            .hosted_zone
            .as_ref()
            .context("spec.hostedZone is required for NFS servers")?;

        let mut props = NfsServerProps::new(
            &config.name,
            &config.hostname,
            HostedZone {
                id: zone.id.clone(),
                name: zone.name.clone(),
            },
            mount_spec(&config.mount)?,
        );
        props.subnets = config.subnets.clone();
        props.volume = match &config.volume.existing {
            Some(existing) => VolumeSource::Existing {
                volume_id: existing.volume_id.clone(),
                availability_zone: existing.availability_zone.clone(),
            },
            None => VolumeSource::New {
                size_gib: config.volume.size_gib.unwrap_or(DEFAULT_VOLUME_SIZE_GIB),
                encrypted: config.volume.encrypted.unwrap_or(true),
            },
        };
        props.format = config.volume.format;
        props.instance_type = config.instance_type.clone();
        props.key_name = config.key_name.clone();
        props.role = config.role.clone();
        props.security_groups = config
            .security_groups
            .iter()
            .map(|id| SecurityGroupRef::Imported(id.clone()))
            .collect();
        props.log_retention_days = self.config.spec.log_retention_days;

        let mut server = NfsServerInstance::new(stack, props)?;
        for share in &config.shares {
            match &share.options {
                Some(options) => server.share_with_options(stack, &share.client, options.clone())?,
                None => server.share(stack, &share.client)?,
            }
        }
        Ok(server)
    }
}

fn mount_spec(config: &MountConfig) -> Result<MountSpec> {
    MountSpec::new(&config.location, config.permission, config.extra_options.clone())
        .with_context(|| format!("Invalid mount location '{}'", config.location))
}

fn mount_on(built: &mut BuiltStack, filesystem: &str, target: &InstanceId, mount: &MountSpec) -> Result<()> {
    let BuiltStack {
        stack,
        nfs_servers,
        lustre_filesystems,
        ..
    } = built;

    let result = if let Some(server) = nfs_servers.iter().find(|s| s.name() == filesystem) {
        server.mount_to_linux_instance(stack, target, mount)
    } else if let Some(lustre) = lustre_filesystems.iter().find(|l| l.name() == filesystem) {
        lustre.mount_to_linux_instance(stack, target, mount)
    } else {
        anyhow::bail!("Unknown filesystem '{}'", filesystem);
    };

    result.with_context(|| format!("Failed to mount '{}' on instance '{}'", filesystem, target))
}
