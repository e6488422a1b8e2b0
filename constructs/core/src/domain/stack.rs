// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stack (Deployment Unit)
//!
//! The scope that owns resource identities and the per-stack view of the
//! asset cache. Constructs append to a stack; the infrastructure layer later
//! renders it into a deployment template.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Resource registry for one deployment unit

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

use crate::domain::asset::{AssetCache, AssetHandle, AssetKey, StackId};
use crate::domain::instance::{Instance, InstanceId, InstanceProps};
use crate::domain::network::{Network, NetworkPolicy};

#[derive(Debug, Error)]
pub enum StackError {
    #[error("Invalid construct name '{0}': use letters and digits, starting with a letter")]
    InvalidName(String),

    #[error("Construct '{0}' is already declared in this stack")]
    DuplicateConstruct(String),

    #[error("Unknown instance '{0}'")]
    UnknownInstance(String),
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").expect("static regex"))
}

/// Placeholder for a resource id that is only known at deploy time.
///
/// Boot commands and policy resources may embed it; template rendering
/// resolves it to a reference to `logical_id`.
pub fn deploy_time_ref(logical_id: &str) -> String {
    format!("{{{{ref:{}}}}}", logical_id)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEnvironment {
    pub account: String,
    pub region: String,
}

impl StackEnvironment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// Default bucket for staged assets in this environment
    pub fn default_asset_bucket(&self) -> String {
        format!("sharefs-assets-{}-{}", self.account, self.region)
    }
}

/// Filesystem written onto a fresh block volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeFormat {
    #[default]
    Xfs,
    Ext4,
}

impl std::fmt::Display for VolumeFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xfs => f.write_str("xfs"),
            Self::Ext4 => f.write_str("ext4"),
        }
    }
}

/// Persistent block volume, either declared here or supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockVolume {
    Declared {
        logical_id: String,
        availability_zone: String,
        size_gib: u32,
        encrypted: bool,
    },
    Existing {
        volume_id: String,
        availability_zone: String,
    },
}

impl BlockVolume {
    /// Volume id as usable in boot commands
    pub fn volume_reference(&self) -> String {
        match self {
            Self::Declared { logical_id, .. } => deploy_time_ref(logical_id),
            Self::Existing { volume_id, .. } => volume_id.clone(),
        }
    }

    pub fn availability_zone(&self) -> &str {
        match self {
            Self::Declared { availability_zone, .. } | Self::Existing { availability_zone, .. } => {
                availability_zone
            }
        }
    }
}

/// DNS A-record pointing at an instance's static private address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub logical_id: String,
    pub zone_id: String,
    pub zone_name: String,
    pub hostname: String,
    pub target: InstanceId,
}

impl DnsRecord {
    pub fn fqdn(&self) -> String {
        format!("{}.{}", self.hostname, self.zone_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogGroup {
    pub logical_id: String,
    pub name: String,
    pub retention_days: u32,
}

pub struct Stack {
    id: StackId,
    name: String,
    environment: StackEnvironment,
    network: Network,
    asset_cache: AssetCache,
    asset_bucket: String,
    construct_names: BTreeSet<String>,
    instances: BTreeMap<InstanceId, Instance>,
    volumes: Vec<BlockVolume>,
    dns_records: Vec<DnsRecord>,
    log_groups: Vec<LogGroup>,
    network_policy: NetworkPolicy,
    assets: BTreeMap<AssetKey, Arc<AssetHandle>>,
}

impl Stack {
    pub fn new(
        name: impl Into<String>,
        environment: StackEnvironment,
        network: Network,
        asset_cache: AssetCache,
    ) -> Result<Self, StackError> {
        let name = name.into();
        if !name_pattern().is_match(&name) {
            return Err(StackError::InvalidName(name));
        }
        let asset_bucket = environment.default_asset_bucket();

        Ok(Self {
            id: StackId::new(),
            name,
            environment,
            network,
            asset_cache,
            asset_bucket,
            construct_names: BTreeSet::new(),
            instances: BTreeMap::new(),
            volumes: Vec::new(),
            dns_records: Vec::new(),
            log_groups: Vec::new(),
            network_policy: NetworkPolicy::new(),
            assets: BTreeMap::new(),
        })
    }

    pub fn with_asset_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.asset_bucket = bucket.into();
        self
    }

    pub fn id(&self) -> StackId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn environment(&self) -> &StackEnvironment {
        &self.environment
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn asset_bucket(&self) -> &str {
        &self.asset_bucket
    }

    /// Check that `name` is well formed and not yet taken, without reserving it
    pub fn check_name(&self, name: &str) -> Result<(), StackError> {
        if !name_pattern().is_match(name) {
            return Err(StackError::InvalidName(name.to_string()));
        }
        if self.construct_names.contains(name) {
            return Err(StackError::DuplicateConstruct(name.to_string()));
        }
        Ok(())
    }

    /// Reserve a construct name; names are unique within a stack
    pub fn reserve_name(&mut self, name: &str) -> Result<(), StackError> {
        self.check_name(name)?;
        self.construct_names.insert(name.to_string());
        Ok(())
    }

    pub fn add_instance(&mut self, props: InstanceProps) -> Result<InstanceId, StackError> {
        self.reserve_name(&props.name)?;
        let instance = Instance::from_props(props);
        let id = instance.id().clone();
        tracing::debug!(stack = %self.name, instance = %id, "Declared instance");
        self.instances.insert(id.clone(), instance);
        Ok(id)
    }

    pub fn instance(&self, id: &InstanceId) -> Result<&Instance, StackError> {
        self.instances
            .get(id)
            .ok_or_else(|| StackError::UnknownInstance(id.to_string()))
    }

    pub fn instance_mut(&mut self, id: &InstanceId) -> Result<&mut Instance, StackError> {
        self.instances
            .get_mut(id)
            .ok_or_else(|| StackError::UnknownInstance(id.to_string()))
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn add_block_volume(&mut self, volume: BlockVolume) {
        self.volumes.push(volume);
    }

    pub fn block_volumes(&self) -> &[BlockVolume] {
        &self.volumes
    }

    pub fn add_dns_record(&mut self, record: DnsRecord) {
        self.dns_records.push(record);
    }

    pub fn dns_records(&self) -> &[DnsRecord] {
        &self.dns_records
    }

    pub fn add_log_group(&mut self, group: LogGroup) {
        self.log_groups.push(group);
    }

    pub fn log_groups(&self) -> &[LogGroup] {
        &self.log_groups
    }

    pub fn network_policy(&self) -> &NetworkPolicy {
        &self.network_policy
    }

    pub fn network_policy_mut(&mut self) -> &mut NetworkPolicy {
        &mut self.network_policy
    }

    /// Stage an asset through the injected cache and register it with this
    /// stack. The factory runs at most once per `(stack, key)`.
    pub fn stage_asset<F, E>(&mut self, key: AssetKey, factory: F) -> Result<Arc<AssetHandle>, E>
    where
        F: FnOnce() -> Result<AssetHandle, E>,
    {
        let handle = self.asset_cache.get_or_create(self.id, key, factory)?;
        self.assets.entry(key).or_insert_with(|| handle.clone());
        Ok(handle)
    }

    pub fn assets(&self) -> impl Iterator<Item = &Arc<AssetHandle>> {
        self.assets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AssetError;
    use crate::domain::network::{Subnet, SubnetType};

    fn subnet() -> Subnet {
        Subnet {
            id: "subnet-a".to_string(),
            availability_zone: "us-west-2a".to_string(),
            subnet_type: SubnetType::Private,
            group: None,
        }
    }

    fn stack() -> Stack {
        Stack::new(
            "Storage",
            StackEnvironment::new("123456789012", "us-west-2"),
            Network::new("vpc-1", vec![subnet()]),
            AssetCache::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_invalid_stack_name() {
        let result = Stack::new(
            "bad name",
            StackEnvironment::new("1", "r"),
            Network::new("vpc", vec![]),
            AssetCache::new(),
        );
        assert!(matches!(result, Err(StackError::InvalidName(_))));
    }

    #[test]
    fn test_duplicate_instance_rejected() {
        let mut stack = stack();
        stack.add_instance(InstanceProps::new("Worker", subnet())).unwrap();
        let result = stack.add_instance(InstanceProps::new("Worker", subnet()));
        assert!(matches!(result, Err(StackError::DuplicateConstruct(_))));
    }

    #[test]
    fn test_check_name_does_not_reserve() {
        let mut stack = stack();
        assert!(matches!(stack.check_name("Bad Name"), Err(StackError::InvalidName(_))));
        stack.check_name("Worker").unwrap();
        stack.check_name("Worker").unwrap();

        stack.reserve_name("Worker").unwrap();
        assert!(matches!(stack.check_name("Worker"), Err(StackError::DuplicateConstruct(_))));
    }

    #[test]
    fn test_default_asset_bucket() {
        let stack = stack();
        assert_eq!(stack.asset_bucket(), "sharefs-assets-123456789012-us-west-2");
    }

    #[test]
    fn test_stage_asset_registers_once() {
        let mut stack = stack();
        let key = AssetKey::derive("bundle");
        let make = || {
            Ok::<_, AssetError>(AssetHandle {
                key,
                name: "bundle".to_string(),
                hash: "ff".to_string(),
                bucket: "b".to_string(),
                object_key: "ff.tar".to_string(),
                contents: Vec::new(),
            })
        };

        let first = stack.stage_asset(key, make).unwrap();
        let second = stack.stage_asset(key, make).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(stack.assets().count(), 1);
    }

    #[test]
    fn test_volume_reference() {
        let declared = BlockVolume::Declared {
            logical_id: "RepositoryVolume".to_string(),
            availability_zone: "us-west-2a".to_string(),
            size_gib: 20,
            encrypted: true,
        };
        let existing = BlockVolume::Existing {
            volume_id: "vol-0abc".to_string(),
            availability_zone: "us-west-2a".to_string(),
        };
        assert_eq!(declared.volume_reference(), "{{ref:RepositoryVolume}}");
        assert_eq!(existing.volume_reference(), "vol-0abc");
    }

    #[test]
    fn test_unknown_instance() {
        let stack = stack();
        let result = stack.instance(&InstanceId::new("Ghost"));
        assert!(matches!(result, Err(StackError::UnknownInstance(_))));
    }
}
