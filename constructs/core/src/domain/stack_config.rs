// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Stack Configuration Types
//
// Declarative description of a stack, loaded from YAML:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Target environment and asset bucket
// - Network and subnets the constructs are placed in
// - NFS servers with their exports, referenced Lustre filesystems
// - Client instances and what they mount

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::domain::instance::OsType;
use crate::domain::lustre::LustreDistribution;
use crate::domain::mount::MountPermission;
use crate::domain::network::{Network, SubnetSelection};
use crate::domain::stack::VolumeFormat;

pub const API_VERSION: &str = "sharefs.io/v1";
pub const KIND: &str = "Stack";

/// Manifest file name searched for from the working directory upwards
pub const MANIFEST_FILE: &str = "sharefs.yaml";

/// Top-level Kubernetes-style stack manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfigManifest {
    /// API version (must be "sharefs.io/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "Stack")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: StackConfigSpec,
}

pub type StackConfig = StackConfigManifest;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Stack name, also the prefix of every log group
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackConfigSpec {
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub assets: AssetsConfig,

    #[serde(default = "default_network")]
    pub network: Network,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_zone: Option<HostedZoneConfig>,

    /// Retention for shipped boot logs
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,

    #[serde(default)]
    pub nfs_servers: Vec<NfsServerConfig>,

    #[serde(default)]
    pub lustre_filesystems: Vec<LustreFilesystemConfig>,

    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub account: String,
    pub region: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetsConfig {
    /// Defaults to `sharefs-assets-<account>-<region>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostedZoneConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MountConfig {
    pub location: String,
    #[serde(default)]
    pub permission: MountPermission,
    #[serde(default)]
    pub extra_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingVolumeConfig {
    pub volume_id: String,
    pub availability_zone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeConfig {
    /// Size of a new volume (default 20)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_gib: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    #[serde(default)]
    pub format: VolumeFormat,
    /// Use this volume instead of declaring a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing: Option<ExistingVolumeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareConfig {
    pub client: String,
    /// Export options; the server defaults apply when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfsServerConfig {
    pub name: String,
    pub hostname: String,
    #[serde(default)]
    pub subnets: SubnetSelection,
    pub mount: MountConfig,
    #[serde(default)]
    pub volume: VolumeConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Imported security group ids added to the server
    #[serde(default)]
    pub security_groups: Vec<String>,
    #[serde(default)]
    pub shares: Vec<ShareConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LustreFilesystemConfig {
    pub name: String,
    pub file_system_id: String,
    pub mount_name: String,
    pub security_group_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMountConfig {
    /// Name of an NFS server or Lustre filesystem in this stack
    pub filesystem: String,
    #[serde(flatten)]
    pub mount: MountConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceConfig {
    pub name: String,
    #[serde(default)]
    pub os: OsType,
    /// Required when mounting a Lustre filesystem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<LustreDistribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default)]
    pub subnets: SubnetSelection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default)]
    pub mounts: Vec<InstanceMountConfig>,
}

fn default_network() -> Network {
    Network::new("default", Vec::new())
}

fn default_log_retention_days() -> u32 {
    3
}

impl Default for StackConfigSpec {
    fn default() -> Self {
        Self {
            environment: EnvironmentConfig {
                account: "000000000000".to_string(),
                region: "us-east-1".to_string(),
            },
            assets: AssetsConfig::default(),
            network: default_network(),
            hosted_zone: None,
            log_retention_days: default_log_retention_days(),
            nfs_servers: vec![],
            lustre_filesystems: vec![],
            instances: vec![],
        }
    }
}

impl Default for StackConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "SharedStorage".to_string(),
                labels: None,
            },
            spec: StackConfigSpec::default(),
        }
    }
}

impl StackConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Candidate manifest locations, most specific first: `sharefs.yaml` in
    /// `start` and then in each of its ancestors, like a project file, then
    /// the user's `<config dir>/sharefs/sharefs.yaml`
    pub fn search_paths(start: &Path) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = start.ancestors().map(|dir| dir.join(MANIFEST_FILE)).collect();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("sharefs").join(MANIFEST_FILE));
        }
        paths
    }

    /// First manifest on the search path from `start`
    pub fn discover_from(start: &Path) -> Option<PathBuf> {
        Self::search_paths(start).into_iter().find(|path| path.is_file())
    }

    /// Load the manifest at `explicit_path`, or the one discovered from the
    /// working directory. With neither, the stack is empty.
    ///
    /// An explicit path must exist and parse.
    pub fn load_or_default(explicit_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let path = match explicit_path {
            Some(path) => Some(path),
            None => {
                let cwd = std::env::current_dir().context("Failed to read the working directory")?;
                Self::discover_from(&cwd)
            }
        };

        let mut config = match path {
            Some(path) => {
                tracing::info!(path = %path.display(), "Loading stack manifest");
                Self::from_yaml_file(&path).with_context(|| format!("Failed to load stack manifest {:?}", path))?
            }
            None => {
                tracing::warn!("No {} found above the working directory; using an empty stack", MANIFEST_FILE);
                Self::default()
            }
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(region) = std::env::var("SHAREFS_REGION") {
            tracing::info!("Environment override: SHAREFS_REGION={}", region);
            self.spec.environment.region = region;
        }

        if let Ok(account) = std::env::var("SHAREFS_ACCOUNT") {
            tracing::info!("Environment override: SHAREFS_ACCOUNT={}", account);
            self.spec.environment.account = account;
        }

        if let Ok(bucket) = std::env::var("SHAREFS_ASSET_BUCKET") {
            tracing::info!("Environment override: SHAREFS_ASSET_BUCKET={}", bucket);
            self.spec.assets.bucket = Some(bucket);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let spec = &self.spec;
        if spec.environment.account.is_empty() || spec.environment.region.is_empty() {
            anyhow::bail!("spec.environment.account and spec.environment.region are required");
        }

        let mut names = HashSet::new();
        let declared = spec
            .nfs_servers
            .iter()
            .map(|s| s.name.as_str())
            .chain(spec.lustre_filesystems.iter().map(|l| l.name.as_str()))
            .chain(spec.instances.iter().map(|i| i.name.as_str()));
        for name in declared {
            if name.is_empty() {
                anyhow::bail!("Construct names cannot be empty");
            }
            if !names.insert(name) {
                anyhow::bail!("Construct name '{}' is declared more than once", name);
            }
        }

        let needs_subnets = !spec.nfs_servers.is_empty() || !spec.instances.is_empty();
        if needs_subnets && spec.network.subnets.is_empty() {
            anyhow::bail!("spec.network.subnets cannot be empty when servers or instances are declared");
        }

        if !spec.nfs_servers.is_empty() && spec.hosted_zone.is_none() {
            anyhow::bail!("spec.hostedZone is required to register NFS server hostnames");
        }

        for server in &spec.nfs_servers {
            if server.hostname.is_empty() {
                anyhow::bail!("NFS server '{}' has an empty hostname", server.name);
            }
            for share in &server.shares {
                if share.client.is_empty() {
                    anyhow::bail!("NFS server '{}' has a share with an empty client", server.name);
                }
            }
        }

        for instance in &spec.instances {
            for mount in &instance.mounts {
                let is_nfs = spec.nfs_servers.iter().any(|s| s.name == mount.filesystem);
                let is_lustre = spec
                    .lustre_filesystems
                    .iter()
                    .any(|l| l.name == mount.filesystem);
                if !is_nfs && !is_lustre {
                    anyhow::bail!(
                        "Instance '{}' mounts unknown filesystem '{}'",
                        instance.name,
                        mount.filesystem
                    );
                }
                if is_lustre && instance.distribution.is_none() {
                    anyhow::bail!(
                        "Instance '{}' mounts Lustre filesystem '{}' but declares no distribution",
                        instance.name,
                        mount.filesystem
                    );
                }
            }
        }

        Ok(())
    }
}
