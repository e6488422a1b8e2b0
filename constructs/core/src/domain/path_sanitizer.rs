// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Path Sanitizer Domain Service
//!
//! Normalizes mount and export paths before they are interpolated into boot
//! commands: redundant separators collapse, `.` components and trailing
//! separators disappear, and `..` components are refused outright.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Implements path normalization for mount locations

use std::path::{Component, PathBuf};
use thiserror::Error;

/// Path normalization errors
#[derive(Debug, Error)]
pub enum PathError {
    #[error("Path traversal component in mount path: {0}")]
    PathTraversal(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path too long: {0}")]
    PathTooLong(String),
}

/// Path sanitizer domain service
///
/// Works purely lexically; the paths it handles live on machines that do not
/// exist yet, so nothing is resolved against the local filesystem.
pub struct PathSanitizer {
    /// Maximum allowed path length (default: 4096, PATH_MAX on Linux)
    max_path_len: usize,
}

impl PathSanitizer {
    pub fn new() -> Self {
        Self { max_path_len: 4096 }
    }

    pub fn with_max_length(max_path_len: usize) -> Self {
        Self { max_path_len }
    }

    /// Normalize a path
    ///
    /// # Examples
    /// ```
    /// use sharefs_core::domain::path_sanitizer::PathSanitizer;
    /// use std::path::PathBuf;
    ///
    /// let sanitizer = PathSanitizer::new();
    /// let path = sanitizer.normalize("/mnt//shared/./data/").unwrap();
    /// assert_eq!(path, PathBuf::from("/mnt/shared/data"));
    ///
    /// assert!(sanitizer.normalize("/mnt/../etc").is_err());
    /// ```
    pub fn normalize(&self, path: &str) -> Result<PathBuf, PathError> {
        if path.len() > self.max_path_len {
            return Err(PathError::PathTooLong(path.to_string()));
        }

        if path.is_empty() {
            return Err(PathError::InvalidPath("Path is empty".to_string()));
        }

        if path.contains('\0') {
            tracing::warn!(path = %path, "Path contains null byte");
            return Err(PathError::InvalidPath(
                "Path contains null byte".to_string(),
            ));
        }

        let mut normalized = PathBuf::new();
        for component in PathBuf::from(path).components() {
            match component {
                Component::Prefix(_) | Component::RootDir => {
                    normalized.push(component);
                }
                Component::CurDir => {}
                Component::Normal(part) => {
                    normalized.push(part);
                }
                Component::ParentDir => {
                    tracing::warn!(path = %path, "Mount path contains '..' component");
                    return Err(PathError::PathTraversal(path.to_string()));
                }
            }
        }

        if normalized.as_os_str().is_empty() {
            return Err(PathError::InvalidPath(path.to_string()));
        }

        Ok(normalized)
    }
}

impl Default for PathSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_separators() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.normalize("/mnt///nfs//share").unwrap();
        assert_eq!(result, PathBuf::from("/mnt/nfs/share"));
    }

    #[test]
    fn test_strip_trailing_separator() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.normalize("/mnt/nfs/").unwrap();
        assert_eq!(result.to_string_lossy(), "/mnt/nfs");
    }

    #[test]
    fn test_root_stays_root() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.normalize("///").unwrap();
        assert_eq!(result, PathBuf::from("/"));
    }

    #[test]
    fn test_normalize_current_dir() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.normalize("/mnt/./data/./x").unwrap();
        assert_eq!(result, PathBuf::from("/mnt/data/x"));
    }

    #[test]
    fn test_reject_parent_dir() {
        let sanitizer = PathSanitizer::new();
        let result = sanitizer.normalize("/mnt/../etc/passwd");
        assert!(matches!(result, Err(PathError::PathTraversal(_))));
    }

    #[test]
    fn test_reject_empty() {
        let sanitizer = PathSanitizer::new();
        assert!(matches!(sanitizer.normalize(""), Err(PathError::InvalidPath(_))));
    }

    #[test]
    fn test_path_too_long() {
        let sanitizer = PathSanitizer::with_max_length(10);
        let result = sanitizer.normalize("/very/long/path/that/exceeds/limit");
        assert!(matches!(result, Err(PathError::PathTooLong(_))));
    }
}
