// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Block-volume mounts driven by the `mount-ebs.sh` bundle

use crate::application::mount_commands::{mount_with_bundle, BundleMount};
use crate::domain::filesystem::{FilesystemError, FilesystemKind};
use crate::domain::instance::{InstanceId, PolicyStatement};
use crate::domain::mount::MountSpec;
use crate::domain::stack::{deploy_time_ref, BlockVolume, Stack, VolumeFormat};
use crate::infrastructure::scripts::{ScriptBundle, MOUNT_EBS_SCRIPT};

/// Attach `volume` to `target` at boot, format it when blank and mount it.
///
/// The volume is attached by the instance itself, so its role is allowed to
/// attach that one volume.
pub fn mount_block_volume(
    stack: &mut Stack,
    target: &InstanceId,
    volume: &BlockVolume,
    format: VolumeFormat,
    mount: &MountSpec,
) -> Result<(), FilesystemError> {
    let env = stack.environment().clone();
    let volume_arn = match volume {
        BlockVolume::Declared { logical_id, .. } => format!(
            "arn:aws:ec2:{}:{}:volume/{}",
            env.region,
            env.account,
            deploy_time_ref(logical_id)
        ),
        BlockVolume::Existing { volume_id, .. } => {
            format!("arn:aws:ec2:{}:{}:volume/{}", env.region, env.account, volume_id)
        }
    };

    mount_with_bundle(
        stack,
        target,
        BundleMount {
            // The server's own volume is only ever mounted on Linux
            kind: FilesystemKind::SelfHostedNfs,
            bundle: ScriptBundle::EBS,
            script: MOUNT_EBS_SCRIPT,
            args: vec![
                volume.volume_reference(),
                format.to_string(),
                mount.location_str(),
                mount.options_token(&[]),
            ],
            install_commands: Vec::new(),
            ingress: None,
        },
    )?;

    stack
        .instance_mut(target)?
        .role_mut()
        .add_statement(PolicyStatement::allow(
            ["ec2:AttachVolume"],
            [
                volume_arn,
                format!("arn:aws:ec2:{}:{}:instance/*", env.region, env.account),
            ],
        ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AssetCache;
    use crate::domain::instance::InstanceProps;
    use crate::domain::network::{Network, Subnet, SubnetType};
    use crate::domain::stack::StackEnvironment;

    #[test]
    fn test_declared_volume_mount_uses_deploy_time_id() {
        let subnet = Subnet {
            id: "subnet-a".to_string(),
            availability_zone: "us-west-2a".to_string(),
            subnet_type: SubnetType::Private,
            group: None,
        };
        let mut stack = Stack::new(
            "Storage",
            StackEnvironment::new("123456789012", "us-west-2"),
            Network::new("vpc-1", vec![subnet.clone()]),
            AssetCache::new(),
        )
        .unwrap();
        let server = stack.add_instance(InstanceProps::new("Repository", subnet)).unwrap();
        let volume = BlockVolume::Declared {
            logical_id: "RepositoryVolume".to_string(),
            availability_zone: "us-west-2a".to_string(),
            size_gib: 20,
            encrypted: true,
        };

        mount_block_volume(
            &mut stack,
            &server,
            &volume,
            VolumeFormat::Xfs,
            &MountSpec::read_write("/srv/nfs").unwrap(),
        )
        .unwrap();

        let instance = stack.instance(&server).unwrap();
        assert!(instance
            .user_data()
            .commands()
            .contains(&"bash ./mount-ebs.sh '{{ref:RepositoryVolume}}' xfs /srv/nfs rw".to_string()));
        assert!(instance
            .role()
            .statements()
            .iter()
            .any(|s| s.actions == vec!["ec2:AttachVolume".to_string()]));
        assert!(stack.network_policy().is_empty());
    }
}
