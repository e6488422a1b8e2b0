// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Compute Instances
//!
//! A Linux or Windows machine declared in a stack, together with its boot
//! script, IAM role and security groups. Filesystems never touch an instance
//! directly; they append to its [`UserData`] and grant through its [`Role`].
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Mount targets and NFS server hosts

use serde::{Deserialize, Serialize};

use crate::domain::lustre::LustreDistribution;
use crate::domain::network::{SecurityGroupRef, Subnet};

/// Logical id of a compute instance within its stack
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    #[default]
    Linux,
    Windows,
}

impl std::fmt::Display for OsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linux => write!(f, "Linux"),
            Self::Windows => write!(f, "Windows"),
        }
    }
}

/// Ordered, append-only boot-script buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    os: OsType,
    commands: Vec<String>,
}

impl UserData {
    pub fn for_os(os: OsType) -> Self {
        Self {
            os,
            commands: Vec::new(),
        }
    }

    pub fn add_commands<I, S>(&mut self, commands: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(commands.into_iter().map(Into::into));
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Full script text as handed to the instance at launch
    pub fn render(&self) -> String {
        match self.os {
            OsType::Linux => format!("#!/bin/bash\n{}", self.commands.join("\n")),
            OsType::Windows => format!("<powershell>{}</powershell>", self.commands.join("\n")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// IAM policy statement attached to an instance role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub effect: Effect,
    #[serde(rename = "Action")]
    pub actions: Vec<String>,
    #[serde(rename = "Resource")]
    pub resources: Vec<String>,
}

impl PolicyStatement {
    pub fn allow<A, R>(actions: A, resources: R) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }
}

/// Execution identity of an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    logical_id: String,
    statements: Vec<PolicyStatement>,
}

impl Role {
    pub fn new(logical_id: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            statements: Vec::new(),
        }
    }

    pub fn logical_id(&self) -> &str {
        &self.logical_id
    }

    /// Attach a statement; an identical statement is only kept once
    pub fn add_statement(&mut self, statement: PolicyStatement) {
        if !self.statements.contains(&statement) {
            self.statements.push(statement);
        }
    }

    pub fn statements(&self) -> &[PolicyStatement] {
        &self.statements
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootVolume {
    pub size_gib: u32,
    pub encrypted: bool,
}

impl Default for RootVolume {
    fn default() -> Self {
        Self {
            size_gib: 10,
            encrypted: true,
        }
    }
}

/// Properties for declaring a compute instance
#[derive(Debug, Clone)]
pub struct InstanceProps {
    pub name: String,
    pub os: OsType,
    pub instance_type: String,
    pub subnet: Subnet,
    pub root_volume: RootVolume,
    pub key_name: Option<String>,
    /// Extra groups on top of the instance's own security group
    pub security_groups: Vec<SecurityGroupRef>,
    /// Caller-supplied role logical id; a fresh role is declared when absent
    pub role: Option<String>,
    /// Linux distribution, needed to install filesystem clients
    pub distribution: Option<LustreDistribution>,
}

impl InstanceProps {
    pub fn new(name: impl Into<String>, subnet: Subnet) -> Self {
        Self {
            name: name.into(),
            os: OsType::Linux,
            instance_type: "t3.large".to_string(),
            subnet,
            root_volume: RootVolume::default(),
            key_name: None,
            security_groups: Vec::new(),
            role: None,
            distribution: None,
        }
    }

    pub fn os(mut self, os: OsType) -> Self {
        self.os = os;
        self
    }

    pub fn instance_type(mut self, instance_type: impl Into<String>) -> Self {
        self.instance_type = instance_type.into();
        self
    }

    pub fn distribution(mut self, distribution: LustreDistribution) -> Self {
        self.distribution = Some(distribution);
        self
    }
}

/// A compute instance whose private address lives on its own network
/// interface, so it survives instance replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    id: InstanceId,
    os: OsType,
    instance_type: String,
    subnet: Subnet,
    root_volume: RootVolume,
    key_name: Option<String>,
    security_groups: Vec<SecurityGroupRef>,
    role: Role,
    owns_role: bool,
    distribution: Option<LustreDistribution>,
    user_data: UserData,
}

impl Instance {
    pub(crate) fn from_props(props: InstanceProps) -> Self {
        let id = InstanceId::new(props.name.clone());
        let mut security_groups = vec![SecurityGroupRef::Declared(format!("{}SecurityGroup", props.name))];
        security_groups.extend(props.security_groups);
        let owns_role = props.role.is_none();
        let role = Role::new(props.role.unwrap_or_else(|| format!("{}Role", props.name)));

        Self {
            id,
            os: props.os,
            instance_type: props.instance_type,
            subnet: props.subnet,
            root_volume: props.root_volume,
            key_name: props.key_name,
            security_groups,
            role,
            owns_role,
            distribution: props.distribution,
            user_data: UserData::for_os(props.os),
        }
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn os_type(&self) -> OsType {
        self.os
    }

    pub fn instance_type(&self) -> &str {
        &self.instance_type
    }

    pub fn subnet(&self) -> &Subnet {
        &self.subnet
    }

    pub fn root_volume(&self) -> RootVolume {
        self.root_volume
    }

    pub fn key_name(&self) -> Option<&str> {
        self.key_name.as_deref()
    }

    /// The instance's own security group, used as its network identity
    pub fn network_identity(&self) -> &SecurityGroupRef {
        &self.security_groups[0]
    }

    pub fn security_groups(&self) -> &[SecurityGroupRef] {
        &self.security_groups
    }

    pub fn add_security_group(&mut self, group: SecurityGroupRef) {
        self.security_groups.push(group);
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    pub fn role_mut(&mut self) -> &mut Role {
        &mut self.role
    }

    /// Whether the role was declared alongside this instance
    pub fn owns_role(&self) -> bool {
        self.owns_role
    }

    pub fn distribution(&self) -> Option<LustreDistribution> {
        self.distribution
    }

    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    pub fn user_data_mut(&mut self) -> &mut UserData {
        &mut self.user_data
    }
}
