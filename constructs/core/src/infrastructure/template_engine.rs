// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Script Template Engine
//!
//! Renders shell-script templates with Handlebars. Output is shell, not HTML,
//! so escaping is disabled and every placeholder must be present.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn script templates plus typed context into shell text
//!
//! # Registered Templates
//!
//! - `lustre-amazon-linux-2` - kernel check and Lustre client install for
//!   Amazon Linux 2 (4.14 kernel lineage)

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

pub const LUSTRE_AMAZON_LINUX_2: &str = "lustre-amazon-linux-2";

const TEMPLATES: &[(&str, &str)] = &[(
    LUSTRE_AMAZON_LINUX_2,
    include_str!("templates/lustre-amazon-linux-2.sh.hbs"),
)];

pub struct ScriptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl ScriptTemplateEngine {
    /// Create an engine with every built-in template registered
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, source) in TEMPLATES {
            handlebars
                .register_template_string(name, source)
                .with_context(|| format!("Invalid script template '{}'", name))?;
        }

        Ok(Self { handlebars })
    }

    /// Render a registered template
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .with_context(|| format!("Failed to render script template '{}'", name))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.has_template(name)
    }
}
