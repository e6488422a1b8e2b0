// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lustre Client Distributions
//!
//! The Lustre client must match the running kernel. Each distribution is a
//! tagged variant; only variants with a known kernel requirement can produce
//! install commands, every other variant is an explicit unsupported marker.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Distribution support table and kernel version rules

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("Cannot compare versions '{left}' and '{right}': {left_len} vs {right_len} components")]
    ComponentCountMismatch {
        left: String,
        right: String,
        left_len: usize,
        right_len: usize,
    },
}

#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("Lustre client installation is not supported on distribution {0}")]
    DistributionNotSupported(LustreDistribution),

    #[error("Kernel '{kernel}' does not belong to distribution {distribution}")]
    WrongDistribution {
        distribution: LustreDistribution,
        kernel: String,
    },

    #[error("Invalid kernel requirement for {distribution}: {reason}")]
    InvalidRequirement {
        distribution: LustreDistribution,
        reason: String,
    },

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("Failed to render installer commands: {0}")]
    Render(String),
}

/// Linux distributions a Lustre client could be installed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LustreDistribution {
    /// Amazon Linux 2 running the 4.14 kernel lineage
    AmazonLinux2,
    AmazonLinux2023,
    CentOs7,
    CentOs8,
    RedHat7,
    RedHat8,
    Ubuntu1804,
    Ubuntu2004,
}

impl std::fmt::Display for LustreDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AmazonLinux2 => "amazon-linux-2",
            Self::AmazonLinux2023 => "amazon-linux-2023",
            Self::CentOs7 => "centos-7",
            Self::CentOs8 => "centos-8",
            Self::RedHat7 => "redhat-7",
            Self::RedHat8 => "redhat-8",
            Self::Ubuntu1804 => "ubuntu-18.04",
            Self::Ubuntu2004 => "ubuntu-20.04",
        };
        f.write_str(name)
    }
}

/// CPU architecture as recognized from the kernel release string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelArch {
    X86_64,
    Aarch64,
}

/// What the installer would do for a given running kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelAction {
    InstallClient,
    UpdateKernelAndReboot,
}

/// Per-architecture kernel patterns and minimum known-good releases
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelRequirement {
    pub x86_64_pattern: &'static str,
    pub x86_64_minimum: &'static str,
    pub aarch64_pattern: &'static str,
    pub aarch64_minimum: &'static str,
    pub kernel_update_command: &'static str,
    pub client_install_command: &'static str,
}

const AMAZON_LINUX_2_KERNEL_4_14: KernelRequirement = KernelRequirement {
    x86_64_pattern: r"^4\.14\.[0-9]+-[0-9]+\.[0-9]+\.amzn2\.x86_64$",
    x86_64_minimum: "4.14.104-95.84.amzn2.x86_64",
    aarch64_pattern: r"^4\.14\.[0-9]+-[0-9]+\.[0-9]+\.amzn2\.aarch64$",
    aarch64_minimum: "4.14.181-142.260.amzn2.aarch64",
    kernel_update_command: "yum -y update kernel",
    client_install_command: "amazon-linux-extras install -y lustre2.10",
};

/// Support status, evaluated once per distribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionSupport {
    Supported(KernelRequirement),
    Unsupported,
}

impl LustreDistribution {
    pub fn support(&self) -> DistributionSupport {
        match self {
            Self::AmazonLinux2 => DistributionSupport::Supported(AMAZON_LINUX_2_KERNEL_4_14),
            Self::AmazonLinux2023
            | Self::CentOs7
            | Self::CentOs8
            | Self::RedHat7
            | Self::RedHat8
            | Self::Ubuntu1804
            | Self::Ubuntu2004 => DistributionSupport::Unsupported,
        }
    }

    pub fn all() -> &'static [LustreDistribution] {
        &[
            Self::AmazonLinux2,
            Self::AmazonLinux2023,
            Self::CentOs7,
            Self::CentOs8,
            Self::RedHat7,
            Self::RedHat8,
            Self::Ubuntu1804,
            Self::Ubuntu2004,
        ]
    }
}

impl KernelRequirement {
    /// Check that each minimum release is matched by its own pattern
    pub fn validate(&self, distribution: LustreDistribution) -> Result<(), InstallerError> {
        for (pattern, minimum) in [
            (self.x86_64_pattern, self.x86_64_minimum),
            (self.aarch64_pattern, self.aarch64_minimum),
        ] {
            let regex = Regex::new(pattern).map_err(|e| InstallerError::InvalidRequirement {
                distribution,
                reason: format!("pattern '{}' does not compile: {}", pattern, e),
            })?;
            if !regex.is_match(minimum) {
                return Err(InstallerError::InvalidRequirement {
                    distribution,
                    reason: format!("minimum '{}' does not match '{}'", minimum, pattern),
                });
            }
        }
        Ok(())
    }

    /// Classify a running kernel release and decide the remediation.
    ///
    /// Mirrors the boot-time check rendered into the installer commands.
    pub fn classify(
        &self,
        distribution: LustreDistribution,
        kernel: &str,
    ) -> Result<(KernelArch, KernelAction), InstallerError> {
        let (arch, minimum) = if pattern_matches(self.x86_64_pattern, kernel) {
            (KernelArch::X86_64, self.x86_64_minimum)
        } else if pattern_matches(self.aarch64_pattern, kernel) {
            (KernelArch::Aarch64, self.aarch64_minimum)
        } else {
            return Err(InstallerError::WrongDistribution {
                distribution,
                kernel: kernel.to_string(),
            });
        };

        let action = match compare_kernel_versions(kernel, minimum)? {
            Ordering::Less => KernelAction::UpdateKernelAndReboot,
            Ordering::Equal | Ordering::Greater => KernelAction::InstallClient,
        };
        Ok((arch, action))
    }
}

fn pattern_matches(pattern: &str, value: &str) -> bool {
    Regex::new(pattern).is_ok_and(|r| r.is_match(value))
}

/// Compare two kernel releases component by component.
///
/// Both strings are split on `.` and `-`. Numeric components are compared
/// numerically left to right and the first difference decides; non-numeric
/// components (distribution and architecture tags) are skipped. Differing
/// component counts are a structural error, never a prefix comparison.
pub fn compare_kernel_versions(left: &str, right: &str) -> Result<Ordering, VersionError> {
    let split = |s: &str| s.split(['.', '-']).map(str::to_string).collect::<Vec<_>>();
    let lhs = split(left);
    let rhs = split(right);

    if lhs.len() != rhs.len() {
        return Err(VersionError::ComponentCountMismatch {
            left: left.to_string(),
            right: right.to_string(),
            left_len: lhs.len(),
            right_len: rhs.len(),
        });
    }

    for (a, b) in lhs.iter().zip(rhs.iter()) {
        if let (Ok(a), Ok(b)) = (a.parse::<u64>(), b.parse::<u64>()) {
            match a.cmp(&b) {
                Ordering::Equal => continue,
                decided => return Ok(decided),
            }
        }
    }
    Ok(Ordering::Equal)
}
