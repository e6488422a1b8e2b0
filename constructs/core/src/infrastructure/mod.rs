// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cloud_assembly;
pub mod cloudformation;
pub mod scripts;
pub mod template_engine;

pub use cloud_assembly::{AssemblyManifest, CloudAssembly};
pub use cloudformation::CloudFormationTemplate;
pub use scripts::ScriptBundle;
pub use template_engine::ScriptTemplateEngine;
