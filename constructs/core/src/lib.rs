// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Shared-filesystem constructs: self-hosted NFS servers and managed Lustre
//! filesystems, mounted on Linux instances through boot-time scripts.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Declare, compose and synthesize filesystem constructs

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
