// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lustre Client Installer
//!
//! Produces the boot commands that bring a client's kernel up to the minimum
//! supported release and install the Lustre client. Distribution support is
//! evaluated once, when the installer is built.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Kernel-aware Lustre client installation commands

use serde::Serialize;

use crate::domain::lustre::{DistributionSupport, InstallerError, KernelRequirement, LustreDistribution};
use crate::infrastructure::template_engine::{ScriptTemplateEngine, LUSTRE_AMAZON_LINUX_2};

#[derive(Serialize)]
struct InstallerContext<'a> {
    distribution: String,
    #[serde(flatten)]
    requirement: &'a KernelRequirement,
}

#[derive(Debug, Clone)]
pub struct LustreInstaller {
    distribution: LustreDistribution,
    requirement: KernelRequirement,
}

impl LustreInstaller {
    pub fn new(distribution: LustreDistribution) -> Result<Self, InstallerError> {
        let requirement = match distribution.support() {
            DistributionSupport::Supported(requirement) => requirement,
            DistributionSupport::Unsupported => {
                return Err(InstallerError::DistributionNotSupported(distribution));
            }
        };
        requirement.validate(distribution)?;

        Ok(Self {
            distribution,
            requirement,
        })
    }

    pub fn distribution(&self) -> LustreDistribution {
        self.distribution
    }

    pub fn requirement(&self) -> &KernelRequirement {
        &self.requirement
    }

    /// Ordered shell commands for the target's boot script
    pub fn install_commands(&self) -> Result<Vec<String>, InstallerError> {
        let engine = ScriptTemplateEngine::new().map_err(|e| InstallerError::Render(format!("{:#}", e)))?;
        let context = InstallerContext {
            distribution: self.distribution.to_string(),
            requirement: &self.requirement,
        };
        let rendered = engine
            .render(LUSTRE_AMAZON_LINUX_2, &context)
            .map_err(|e| InstallerError::Render(format!("{:#}", e)))?;

        Ok(rendered
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }
}
