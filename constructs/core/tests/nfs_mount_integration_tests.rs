// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for NFS server orchestration and client mounts
//!
//! These tests verify:
//! 1. Server construction, exports and boot-script layout
//! 2. Client mount commands, options and script contract
//! 3. Asset deduplication within and across stacks
//! 4. Precondition failures leave the stack untouched

use sharefs_core::application::nfs_server::{HostedZone, NfsServerInstance, NfsServerProps};
use sharefs_core::application::ConstructError;
use sharefs_core::domain::asset::AssetCache;
use sharefs_core::domain::filesystem::{FilesystemError, MountableFilesystem};
use sharefs_core::domain::instance::{InstanceId, InstanceProps, OsType};
use sharefs_core::domain::mount::MountSpec;
use sharefs_core::domain::network::{Network, Port, SecurityGroupRef, Subnet, SubnetSelection, SubnetType};
use sharefs_core::domain::stack::{Stack, StackEnvironment};
use sharefs_core::infrastructure::scripts::{ScriptBundle, MOUNT_NFS_SCRIPT};
use std::sync::Arc;

fn subnet() -> Subnet {
    Subnet {
        id: "subnet-a".to_string(),
        availability_zone: "us-west-2a".to_string(),
        subnet_type: SubnetType::Private,
        group: Some("Private".to_string()),
    }
}

fn stack_with(name: &str, cache: &AssetCache) -> Stack {
    Stack::new(
        name,
        StackEnvironment::new("123456789012", "us-west-2"),
        Network::new("vpc-1", vec![subnet()]),
        cache.clone(),
    )
    .unwrap()
}

fn server_props() -> NfsServerProps {
    NfsServerProps::new(
        "Repository",
        "nfs",
        HostedZone {
            id: "Z123".to_string(),
            name: "example.internal".to_string(),
        },
        MountSpec::read_write("/srv/nfs").unwrap(),
    )
}

fn client(stack: &mut Stack, name: &str) -> InstanceId {
    stack.add_instance(InstanceProps::new(name, subnet())).unwrap()
}

#[test]
fn test_end_to_end_share_and_mount() {
    let cache = AssetCache::new();
    let mut stack = stack_with("Storage", &cache);
    let mut server = NfsServerInstance::new(&mut stack, server_props()).unwrap();
    server.share(&mut stack, "client-a").unwrap();

    let worker = client(&mut stack, "Worker");
    let mount = MountSpec::new("/mnt//data/", Default::default(), vec!["option1".to_string()]).unwrap();
    server.mount_to_linux_instance(&mut stack, &worker, &mount).unwrap();

    let commands = stack.instance(&worker).unwrap().user_data().commands().to_vec();
    assert_eq!(commands.len(), 8);
    assert!(commands[0].contains("yum install -y nfs-utils"));
    assert_eq!(commands[1], "TMPDIR=$(mktemp -d)");
    assert_eq!(commands[2], "pushd \"$TMPDIR\"");
    assert!(commands[3].starts_with("aws s3 cp s3://sharefs-assets-123456789012-us-west-2/"));
    assert!(commands[4].starts_with("tar -xf "));
    assert_eq!(
        commands[5],
        "bash ./mount-nfs.sh nfs.example.internal /srv/nfs /mnt/data rw,option1"
    );
    assert_eq!(commands[6], "popd");
    assert!(commands[7].starts_with("rm -f \"${TMPDIR}/"));

    // The mount script itself carries the NFS defaults and the retry loop
    let script = ScriptBundle::NFS.script(MOUNT_NFS_SCRIPT).unwrap().contents;
    assert!(script.contains("mkdir -p \"${MOUNT_PATH}\""));
    assert!(script.contains("hard,timeo=600,retrans=2,_netdev,${MOUNT_OPTIONS}"));
    assert!(script.contains("MAX_TRIES=20"));
    assert!(script.contains("sleep 2"));

    let server_identity = stack.instance(server.instance()).unwrap().network_identity().clone();
    let worker_identity = stack.instance(&worker).unwrap().network_identity().clone();
    let rule = stack
        .network_policy()
        .rules()
        .find(|r| r.source == worker_identity)
        .unwrap();
    assert_eq!(rule.destination, server_identity);
    assert_eq!(rule.port, Port::tcp(2049));
}

#[test]
fn test_read_only_mount_options() {
    let cache = AssetCache::new();
    let mut stack = stack_with("Storage", &cache);
    let server = NfsServerInstance::new(&mut stack, server_props()).unwrap();
    let worker = client(&mut stack, "Worker");

    let mount = MountSpec::new(
        "/mnt/data",
        sharefs_core::domain::mount::MountPermission::ReadOnly,
        vec!["soft".to_string(), "rsize=4096".to_string()],
    )
    .unwrap();
    server.mount_to_linux_instance(&mut stack, &worker, &mount).unwrap();

    let commands = stack.instance(&worker).unwrap().user_data().commands();
    assert!(commands.iter().any(|c| c.ends_with("/mnt/data r,soft,rsize=4096")));
}

#[test]
fn test_repeated_mounts_stage_bundle_once() {
    let cache = AssetCache::new();
    let mut stack = stack_with("Storage", &cache);
    let server = NfsServerInstance::new(&mut stack, server_props()).unwrap();
    let assets_after_server = stack.assets().count();

    let first = client(&mut stack, "WorkerA");
    let second = client(&mut stack, "WorkerB");
    server
        .mount_to_linux_instance(&mut stack, &first, &MountSpec::read_write("/mnt/a").unwrap())
        .unwrap();
    server
        .mount_to_linux_instance(&mut stack, &second, &MountSpec::read_write("/mnt/b").unwrap())
        .unwrap();
    server
        .mount_to_linux_instance(&mut stack, &first, &MountSpec::read_write("/mnt/c").unwrap())
        .unwrap();

    // The server already staged the NFS bundle; clients reuse it
    assert_eq!(stack.assets().count(), assets_after_server);
    let nfs = cache.lookup(stack.id(), ScriptBundle::NFS.key()).unwrap();
    let s3_commands = stack
        .instance(&first)
        .unwrap()
        .user_data()
        .commands()
        .iter()
        .filter(|c| c.contains(&nfs.s3_url()))
        .count();
    assert_eq!(s3_commands, 2);
    // Same worker, same server: one ingress rule
    assert_eq!(
        stack
            .network_policy()
            .rules()
            .filter(|r| r.source == SecurityGroupRef::Declared("WorkerASecurityGroup".to_string()))
            .count(),
        1
    );
}

#[test]
fn test_distinct_stacks_get_distinct_handles() {
    let cache = AssetCache::new();
    let mut first = stack_with("First", &cache);
    let mut second = stack_with("Second", &cache);
    NfsServerInstance::new(&mut first, server_props()).unwrap();
    NfsServerInstance::new(&mut second, server_props()).unwrap();

    let a = cache.lookup(first.id(), ScriptBundle::NFS.key()).unwrap();
    let b = cache.lookup(second.id(), ScriptBundle::NFS.key()).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.hash, b.hash);
}

#[test]
fn test_share_twice_adds_two_exports() {
    let cache = AssetCache::new();
    let mut stack = stack_with("Storage", &cache);
    let mut server = NfsServerInstance::new(&mut stack, server_props()).unwrap();

    server.share(&mut stack, "10.0.0.0/24").unwrap();
    server.share(&mut stack, "10.0.0.0/24").unwrap();

    assert_eq!(server.exports().len(), 2);
    let exports = stack
        .instance(server.instance())
        .unwrap()
        .user_data()
        .commands()
        .iter()
        .filter(|c| c.contains("export-nfs.sh"))
        .count();
    assert_eq!(exports, 2);
}

#[test]
fn test_unmatched_subnet_selection_creates_nothing() {
    let cache = AssetCache::new();
    let mut stack = stack_with("Storage", &cache);
    let mut props = server_props();
    props.subnets = SubnetSelection::of_type(SubnetType::Public);

    let err = NfsServerInstance::new(&mut stack, props).unwrap_err();

    assert!(matches!(err, ConstructError::Network(_)));
    assert!(err.to_string().contains("{\"type\":\"public\"}"));
    assert_eq!(stack.instances().count(), 0);
    assert!(stack.block_volumes().is_empty());
    assert!(stack.dns_records().is_empty());
    assert!(stack.log_groups().is_empty());
    assert_eq!(cache.count(), 0);
}

#[test]
fn test_windows_target_is_untouched() {
    let cache = AssetCache::new();
    let mut stack = stack_with("Storage", &cache);
    let server = NfsServerInstance::new(&mut stack, server_props()).unwrap();
    let desktop = stack
        .add_instance(InstanceProps::new("Desktop", subnet()).os(OsType::Windows))
        .unwrap();
    let rules = stack.network_policy().len();

    let result = server.mount_to_linux_instance(&mut stack, &desktop, &MountSpec::read_write("/mnt/data").unwrap());

    assert!(matches!(result, Err(FilesystemError::UnsupportedPlatform { .. })));
    assert!(stack.instance(&desktop).unwrap().user_data().is_empty());
    assert_eq!(stack.network_policy().len(), rules);
}
