// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Asset Deduplication Cache
//!
//! Every script bundle referenced by a mount is packaged and uploaded at most
//! once per stack. Lookups are keyed by `(StackId, AssetKey)`; the cache is an
//! explicit object injected into each stack rather than a global registry.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Memoized per-stack asset handles

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::instance::{PolicyStatement, Role};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to package asset '{name}': {reason}")]
    Packaging { name: String, reason: String },

    #[error("Asset bucket name is invalid: '{0}'")]
    InvalidBucket(String),
}

/// Unique identifier for a stack (deployment unit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StackId(pub Uuid);

impl StackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StackId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identity of an asset, derived from a UUID namespace and a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetKey(pub Uuid);

impl AssetKey {
    /// Namespace for all bundle keys
    const NAMESPACE: Uuid = Uuid::from_u128(0x5d1c_28a4_7f3e_4c9b_a0b2_9e61_c3f4_0d17);

    pub fn derive(name: &str) -> Self {
        Self(Uuid::new_v5(&Self::NAMESPACE, name.as_bytes()))
    }
}

impl std::fmt::Display for AssetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A packaged file staged for upload, and where it will live once uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetHandle {
    pub key: AssetKey,
    pub name: String,
    /// SHA-256 of the packaged contents, hex encoded
    pub hash: String,
    pub bucket: String,
    pub object_key: String,
    pub contents: Vec<u8>,
}

impl AssetHandle {
    pub fn s3_url(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.object_key)
    }

    pub fn bucket_arn(&self) -> String {
        format!("arn:aws:s3:::{}", self.bucket)
    }

    pub fn object_arn(&self) -> String {
        format!("arn:aws:s3:::{}/{}", self.bucket, self.object_key)
    }

    /// File name of the archive once downloaded
    pub fn file_name(&self) -> &str {
        self.object_key
            .rsplit('/')
            .next()
            .unwrap_or(self.object_key.as_str())
    }

    /// Grant a role read access to this asset
    pub fn grant_read(&self, role: &mut Role) {
        role.add_statement(PolicyStatement::allow(
            ["s3:GetObject*", "s3:GetBucket*", "s3:List*"],
            [self.bucket_arn(), self.object_arn()],
        ));
    }
}

/// Per-stack memoized asset handles
#[derive(Clone, Default)]
pub struct AssetCache {
    handles: Arc<RwLock<HashMap<(StackId, AssetKey), Arc<AssetHandle>>>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the handle registered under `key` for `stack`, creating it with
    /// `factory` on first use. Factory errors are returned unchanged and
    /// nothing is registered.
    pub fn get_or_create<F, E>(
        &self,
        stack: StackId,
        key: AssetKey,
        factory: F,
    ) -> Result<Arc<AssetHandle>, E>
    where
        F: FnOnce() -> Result<AssetHandle, E>,
    {
        if let Some(existing) = self.handles.read().get(&(stack, key)) {
            tracing::debug!(stack = %stack, asset = %key, "Asset cache hit");
            return Ok(existing.clone());
        }

        let mut handles = self.handles.write();
        // Re-check under the write lock so creation happens once
        if let Some(existing) = handles.get(&(stack, key)) {
            return Ok(existing.clone());
        }

        let handle = Arc::new(factory()?);
        tracing::debug!(stack = %stack, asset = %key, name = %handle.name, "Asset cache miss, staged new asset");
        handles.insert((stack, key), handle.clone());
        Ok(handle)
    }

    pub fn lookup(&self, stack: StackId, key: AssetKey) -> Option<Arc<AssetHandle>> {
        self.handles.read().get(&(stack, key)).cloned()
    }

    /// Number of staged assets across all stacks
    pub fn count(&self) -> usize {
        self.handles.read().len()
    }
}
