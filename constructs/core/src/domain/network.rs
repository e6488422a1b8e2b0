// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Network Model
//!
//! Subnet selection against a declared network and the additive ingress
//! policy between security groups. The network itself is never created here;
//! it is referenced by id and its subnets are listed in configuration.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Subnet resolution and idempotent network-policy rules

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("No subnet in network '{network}' matches selection {selection}")]
    NoMatchingSubnet { network: String, selection: String },
}

/// Subnet tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetType {
    Public,
    Private,
    Isolated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub id: String,
    pub availability_zone: String,
    #[serde(rename = "type")]
    pub subnet_type: SubnetType,
    /// Subnet group name (e.g. "Private", "Storage")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Criteria for choosing subnets. Every set field must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSelection {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub subnet_type: Option<SubnetType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_ids: Option<Vec<String>>,
}

impl SubnetSelection {
    pub fn of_type(subnet_type: SubnetType) -> Self {
        Self {
            subnet_type: Some(subnet_type),
            group: None,
            availability_zones: None,
            subnet_ids: None,
        }
    }

    pub fn in_group(group: impl Into<String>) -> Self {
        Self {
            subnet_type: None,
            group: Some(group.into()),
            availability_zones: None,
            subnet_ids: None,
        }
    }

    pub fn with_availability_zones(mut self, zones: Vec<String>) -> Self {
        self.availability_zones = Some(zones);
        self
    }

    fn matches(&self, subnet: &Subnet) -> bool {
        self.subnet_type.is_none_or(|t| t == subnet.subnet_type)
            && self
                .group
                .as_ref()
                .is_none_or(|g| subnet.group.as_ref() == Some(g))
            && self
                .availability_zones
                .as_ref()
                .is_none_or(|zones| zones.contains(&subnet.availability_zone))
            && self
                .subnet_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&subnet.id))
    }

    /// JSON rendering echoed in configuration errors
    pub fn to_criteria_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{:?}", self))
    }
}

impl Default for SubnetSelection {
    fn default() -> Self {
        Self::of_type(SubnetType::Private)
    }
}

/// A network referenced by id with its known subnets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

impl Network {
    pub fn new(id: impl Into<String>, subnets: Vec<Subnet>) -> Self {
        Self {
            id: id.into(),
            subnets,
        }
    }

    /// All subnets matching the selection, in declaration order
    pub fn select_subnets(&self, selection: &SubnetSelection) -> Vec<&Subnet> {
        self.subnets.iter().filter(|s| selection.matches(s)).collect()
    }

    /// First subnet matching the selection
    pub fn first_subnet(&self, selection: &SubnetSelection) -> Result<&Subnet, NetworkError> {
        self.select_subnets(selection)
            .into_iter()
            .next()
            .ok_or_else(|| NetworkError::NoMatchingSubnet {
                network: self.id.clone(),
                selection: selection.to_criteria_string(),
            })
    }
}

/// Reference to a security group: declared in this stack or imported by id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum SecurityGroupRef {
    Declared(String),
    Imported(String),
}

impl std::fmt::Display for SecurityGroupRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Declared(id) => write!(f, "{}", id),
            Self::Imported(id) => write!(f, "{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Port {
    pub protocol: Protocol,
    pub from: u16,
    pub to: u16,
}

impl Port {
    pub const fn tcp(port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            from: port,
            to: port,
        }
    }
}

impl std::fmt::Display for Port {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let proto = match self.protocol {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        };
        if self.from == self.to {
            write!(f, "{} {}", proto, self.from)
        } else {
            write!(f, "{} {}-{}", proto, self.from, self.to)
        }
    }
}

/// One allowed flow: `source` may reach `destination` on `port`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IngressRule {
    pub destination: SecurityGroupRef,
    pub source: SecurityGroupRef,
    pub port: Port,
}

/// Additive set of ingress rules. There is no removal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkPolicy {
    rules: BTreeSet<IngressRule>,
}

impl NetworkPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `source` to reach `destination` on `port`. Returns false when the
    /// rule was already present.
    pub fn allow(
        &mut self,
        source: &SecurityGroupRef,
        destination: &SecurityGroupRef,
        port: Port,
    ) -> bool {
        let inserted = self.rules.insert(IngressRule {
            destination: destination.clone(),
            source: source.clone(),
            port,
        });
        if inserted {
            tracing::debug!(%source, %destination, %port, "Allowed network traffic");
        }
        inserted
    }

    pub fn rules(&self) -> impl Iterator<Item = &IngressRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network() -> Network {
        Network::new(
            "vpc-1",
            vec![
                Subnet {
                    id: "subnet-pub".to_string(),
                    availability_zone: "us-west-2a".to_string(),
                    subnet_type: SubnetType::Public,
                    group: Some("Public".to_string()),
                },
                Subnet {
                    id: "subnet-a".to_string(),
                    availability_zone: "us-west-2a".to_string(),
                    subnet_type: SubnetType::Private,
                    group: Some("Private".to_string()),
                },
                Subnet {
                    id: "subnet-b".to_string(),
                    availability_zone: "us-west-2b".to_string(),
                    subnet_type: SubnetType::Private,
                    group: Some("Private".to_string()),
                },
            ],
        )
    }

    #[test]
    fn test_first_matching_subnet_is_deterministic() {
        let net = network();
        let subnet = net.first_subnet(&SubnetSelection::default()).unwrap();
        assert_eq!(subnet.id, "subnet-a");
    }

    #[test]
    fn test_selection_by_zone() {
        let net = network();
        let selection = SubnetSelection::of_type(SubnetType::Private)
            .with_availability_zones(vec!["us-west-2b".to_string()]);
        assert_eq!(net.first_subnet(&selection).unwrap().id, "subnet-b");
    }

    #[test]
    fn test_no_match_echoes_selection() {
        let net = network();
        let selection = SubnetSelection::in_group("Storage");
        let err = net.first_subnet(&selection).unwrap_err();
        let message = err.to_string();
        assert!(message.contains(r#"{"group":"Storage"}"#), "{}", message);
        assert!(message.contains("vpc-1"));
    }

    #[test]
    fn test_allow_is_idempotent() {
        let mut policy = NetworkPolicy::new();
        let client = SecurityGroupRef::Declared("ClientSg".to_string());
        let server = SecurityGroupRef::Declared("ServerSg".to_string());

        assert!(policy.allow(&client, &server, Port::tcp(2049)));
        assert!(!policy.allow(&client, &server, Port::tcp(2049)));
        assert_eq!(policy.len(), 1);
    }
}
