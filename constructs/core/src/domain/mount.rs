// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mount Specification
//!
//! Value objects describing where and how a shared filesystem is mounted on a
//! client, and the translation of a permission intent into mount flags.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Mount-option translation and option token rendering

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::path_sanitizer::{PathError, PathSanitizer};

/// Mount specification errors
#[derive(Debug, Error)]
pub enum MountError {
    #[error("Mount location must be an absolute path: {0}")]
    RelativeLocation(String),

    #[error("Mount option cannot be empty or contain whitespace: '{0}'")]
    InvalidOption(String),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Permission intent for a mount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MountPermission {
    #[default]
    #[serde(rename = "rw", alias = "read-write", alias = "ReadWrite")]
    ReadWrite,
    #[serde(rename = "r", alias = "read-only", alias = "ReadOnly")]
    ReadOnly,
}

impl MountPermission {
    /// Literal mount flag for this permission
    pub fn as_flag(&self) -> &'static str {
        match self {
            Self::ReadWrite => "rw",
            Self::ReadOnly => "r",
        }
    }
}

impl std::fmt::Display for MountPermission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_flag())
    }
}

/// Map a permission intent to its mount flag.
pub fn translate(permission: MountPermission) -> &'static str {
    permission.as_flag()
}

/// Render the single comma-joined options token passed to a mount script.
///
/// Order is fixed: permission flag, backend defaults, caller extras. Nothing
/// is reordered or deduplicated.
pub fn render_mount_options(
    permission: MountPermission,
    backend_defaults: &[&str],
    extra_options: &[String],
) -> String {
    std::iter::once(translate(permission))
        .chain(backend_defaults.iter().copied())
        .chain(extra_options.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(",")
}

/// Where and how a filesystem is mounted. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    location: PathBuf,
    permission: MountPermission,
    extra_options: Vec<String>,
}

impl MountSpec {
    /// Build a mount spec, normalizing the location.
    pub fn new(
        location: impl AsRef<Path>,
        permission: MountPermission,
        extra_options: Vec<String>,
    ) -> Result<Self, MountError> {
        let raw = location.as_ref().to_string_lossy().into_owned();
        if !raw.starts_with('/') {
            return Err(MountError::RelativeLocation(raw));
        }

        if let Some(bad) = extra_options
            .iter()
            .find(|o| o.is_empty() || o.chars().any(char::is_whitespace))
        {
            return Err(MountError::InvalidOption(bad.clone()));
        }

        let location = PathSanitizer::new().normalize(&raw)?;

        Ok(Self {
            location,
            permission,
            extra_options,
        })
    }

    /// Read-write mount with no extra options
    pub fn read_write(location: impl AsRef<Path>) -> Result<Self, MountError> {
        Self::new(location, MountPermission::ReadWrite, Vec::new())
    }

    /// Read-only mount with no extra options
    pub fn read_only(location: impl AsRef<Path>) -> Result<Self, MountError> {
        Self::new(location, MountPermission::ReadOnly, Vec::new())
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Location as the string interpolated into boot commands
    pub fn location_str(&self) -> String {
        self.location.to_string_lossy().into_owned()
    }

    pub fn permission(&self) -> MountPermission {
        self.permission
    }

    pub fn extra_options(&self) -> &[String] {
        &self.extra_options
    }

    /// Options token with the given backend defaults spliced in
    pub fn options_token(&self, backend_defaults: &[&str]) -> String {
        render_mount_options(self.permission, backend_defaults, &self.extra_options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_permissions() {
        assert_eq!(translate(MountPermission::ReadWrite), "rw");
        assert_eq!(translate(MountPermission::ReadOnly), "r");
    }

    #[test]
    fn test_options_are_order_preserving() {
        let extras = vec!["soft".to_string(), "rsize=4096".to_string()];
        let token = render_mount_options(MountPermission::ReadWrite, &[], &extras);
        assert_eq!(token, "rw,soft,rsize=4096");
    }

    #[test]
    fn test_backend_defaults_sit_between_flag_and_extras() {
        let extras = vec!["noatime".to_string()];
        let token = render_mount_options(MountPermission::ReadOnly, &["flock"], &extras);
        assert_eq!(token, "r,flock,noatime");
    }

    #[test]
    fn test_duplicate_options_are_kept() {
        let extras = vec!["rw".to_string(), "rw".to_string()];
        let token = render_mount_options(MountPermission::ReadWrite, &[], &extras);
        assert_eq!(token, "rw,rw,rw");
    }

    #[test]
    fn test_location_is_normalized() {
        let spec = MountSpec::read_write("//mnt///share/").unwrap();
        assert_eq!(spec.location_str(), "/mnt/share");
    }

    #[test]
    fn test_relative_location_rejected() {
        let result = MountSpec::read_write("mnt/share");
        assert!(matches!(result, Err(MountError::RelativeLocation(_))));
    }

    #[test]
    fn test_whitespace_option_rejected() {
        let result = MountSpec::new(
            "/mnt/share",
            MountPermission::ReadWrite,
            vec!["soft hard".to_string()],
        );
        assert!(matches!(result, Err(MountError::InvalidOption(_))));
    }

    #[test]
    fn test_permission_yaml_names() {
        let rw: MountPermission = serde_yaml::from_str("rw").unwrap();
        let ro: MountPermission = serde_yaml::from_str("read-only").unwrap();
        assert_eq!(rw, MountPermission::ReadWrite);
        assert_eq!(ro, MountPermission::ReadOnly);
    }
}
