// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! CloudFormation Template Rendering
//!
//! Renders a [`Stack`] into a CloudFormation JSON template. Logical ids are
//! derived from construct names only, so re-rendering an unchanged stack
//! yields an identical template.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Stack model to deployment-engine template
//!
//! # Deploy-time references
//!
//! Boot scripts and policy resources may contain `{{ref:LogicalId}}`
//! placeholders. Such strings are emitted through `Fn::Sub` with every other
//! `${` escaped, so shell variable expansions reach the instance untouched.

use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

use crate::domain::instance::{Instance, OsType};
use crate::domain::network::{IngressRule, Protocol, SecurityGroupRef};
use crate::domain::stack::{BlockVolume, DnsRecord, LogGroup, Stack};

const LINUX_IMAGE: &str = "{{resolve:ssm:/aws/service/ami-amazon-linux-latest/amzn2-ami-hvm-x86_64-gp2}}";
const WINDOWS_IMAGE: &str = "{{resolve:ssm:/aws/service/ami-windows-latest/Windows_Server-2019-English-Full-Base}}";

fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{ref:([A-Za-z0-9:]+)\}\}").expect("static regex"))
}

/// Plain string, or `Fn::Sub` when it holds deploy-time references
pub fn render_string(value: &str) -> Value {
    if !reference_pattern().is_match(value) {
        return Value::String(value.to_string());
    }
    let escaped = value.replace("${", "${!");
    let substituted = reference_pattern().replace_all(&escaped, "$${$1}");
    json!({ "Fn::Sub": substituted })
}

fn group_id(group: &SecurityGroupRef) -> Value {
    match group {
        SecurityGroupRef::Declared(logical_id) => json!({ "Fn::GetAtt": [logical_id, "GroupId"] }),
        SecurityGroupRef::Imported(id) => Value::String(id.clone()),
    }
}

fn alphanumeric(value: &str) -> String {
    value.chars().filter(char::is_ascii_alphanumeric).collect()
}

#[derive(Debug, Clone)]
pub struct CloudFormationTemplate {
    body: Value,
}

impl CloudFormationTemplate {
    pub fn from_stack(stack: &Stack) -> Self {
        let mut resources = Map::new();
        let mut outputs = Map::new();

        for instance in stack.instances() {
            render_instance(stack, instance, &mut resources);
        }
        for volume in stack.block_volumes() {
            render_volume(volume, &mut resources);
        }
        for record in stack.dns_records() {
            render_dns_record(record, &mut resources);
            outputs.insert(
                format!("{}Fqdn", record.logical_id),
                json!({ "Value": record.fqdn() }),
            );
        }
        for group in stack.log_groups() {
            render_log_group(group, &mut resources);
        }
        for rule in stack.network_policy().rules() {
            render_ingress(rule, &mut resources);
        }

        tracing::debug!(stack = %stack.name(), resources = resources.len(), "Rendered template");

        Self {
            body: json!({
                "AWSTemplateFormatVersion": "2010-09-09",
                "Description": format!("Shared filesystems for stack {}", stack.name()),
                "Resources": resources,
                "Outputs": outputs,
            }),
        }
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.body.get("Resources").and_then(|r| r.get(logical_id))
    }

    pub fn resource_count(&self) -> usize {
        self.body
            .get("Resources")
            .and_then(Value::as_object)
            .map_or(0, Map::len)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.body)
    }
}

fn render_instance(stack: &Stack, instance: &Instance, resources: &mut Map<String, Value>) {
    let name = instance.id().as_str();
    let security_group = format!("{}SecurityGroup", name);
    let interface = format!("{}NetworkInterface", name);
    let profile = format!("{}InstanceProfile", name);
    let policy = format!("{}DefaultPolicy", name);

    resources.insert(
        security_group.clone(),
        json!({
            "Type": "AWS::EC2::SecurityGroup",
            "Properties": {
                "GroupDescription": format!("{}/{}", stack.name(), name),
                "VpcId": stack.network().id,
                "SecurityGroupEgress": [{ "CidrIp": "0.0.0.0/0", "IpProtocol": "-1" }],
            }
        }),
    );

    let role = instance.role();
    let role_ref = if instance.owns_role() {
        resources.insert(
            role.logical_id().to_string(),
            json!({
                "Type": "AWS::IAM::Role",
                "Properties": {
                    "AssumeRolePolicyDocument": {
                        "Version": "2012-10-17",
                        "Statement": [{
                            "Effect": "Allow",
                            "Principal": { "Service": "ec2.amazonaws.com" },
                            "Action": "sts:AssumeRole",
                        }],
                    },
                }
            }),
        );
        json!({ "Ref": role.logical_id() })
    } else {
        Value::String(role.logical_id().to_string())
    };

    let mut depends_on = Vec::new();
    if !role.statements().is_empty() {
        let statements: Vec<Value> = role
            .statements()
            .iter()
            .map(|s| {
                json!({
                    "Effect": s.effect,
                    "Action": s.actions,
                    "Resource": s.resources.iter().map(|r| render_string(r)).collect::<Vec<_>>(),
                })
            })
            .collect();
        resources.insert(
            policy.clone(),
            json!({
                "Type": "AWS::IAM::Policy",
                "Properties": {
                    "PolicyName": policy,
                    "PolicyDocument": { "Version": "2012-10-17", "Statement": statements },
                    "Roles": [role_ref],
                }
            }),
        );
        depends_on.push(policy);
    }

    resources.insert(
        profile.clone(),
        json!({
            "Type": "AWS::IAM::InstanceProfile",
            "Properties": { "Roles": [role_ref] }
        }),
    );

    resources.insert(
        interface.clone(),
        json!({
            "Type": "AWS::EC2::NetworkInterface",
            "Properties": {
                "Description": format!("{}/{}", stack.name(), name),
                "SubnetId": instance.subnet().id,
                "GroupSet": instance.security_groups().iter().map(group_id).collect::<Vec<_>>(),
            }
        }),
    );

    let image = match instance.os_type() {
        OsType::Linux => LINUX_IMAGE,
        OsType::Windows => WINDOWS_IMAGE,
    };
    let root_device = match instance.os_type() {
        OsType::Linux => "/dev/xvda",
        OsType::Windows => "/dev/sda1",
    };
    let mut properties = json!({
        "ImageId": image,
        "InstanceType": instance.instance_type(),
        "IamInstanceProfile": { "Ref": profile },
        "NetworkInterfaces": [{ "DeviceIndex": "0", "NetworkInterfaceId": { "Ref": interface } }],
        "BlockDeviceMappings": [{
            "DeviceName": root_device,
            "Ebs": {
                "VolumeSize": instance.root_volume().size_gib,
                "Encrypted": instance.root_volume().encrypted,
                "VolumeType": "gp3",
            },
        }],
        "UserData": { "Fn::Base64": render_string(&instance.user_data().render()) },
    });
    if let (Some(key_name), Some(map)) = (instance.key_name(), properties.as_object_mut()) {
        map.insert("KeyName".to_string(), Value::String(key_name.to_string()));
    }

    let mut resource = json!({
        "Type": "AWS::EC2::Instance",
        "Properties": properties,
    });
    if let Some(map) = resource.as_object_mut() {
        if !depends_on.is_empty() {
            map.insert("DependsOn".to_string(), json!(depends_on));
        }
        let signals = instance
            .user_data()
            .commands()
            .iter()
            .any(|c| c.contains("cfn-signal"));
        if signals {
            map.insert(
                "CreationPolicy".to_string(),
                json!({ "ResourceSignal": { "Count": 1, "Timeout": "PT15M" } }),
            );
        }
    }
    resources.insert(format!("{}Instance", name), resource);
}

fn render_volume(volume: &BlockVolume, resources: &mut Map<String, Value>) {
    if let BlockVolume::Declared {
        logical_id,
        availability_zone,
        size_gib,
        encrypted,
    } = volume
    {
        resources.insert(
            logical_id.clone(),
            json!({
                "Type": "AWS::EC2::Volume",
                "Properties": {
                    "AvailabilityZone": availability_zone,
                    "Size": size_gib,
                    "Encrypted": encrypted,
                    "VolumeType": "gp3",
                },
                "DeletionPolicy": "Snapshot",
                "UpdateReplacePolicy": "Snapshot",
            }),
        );
    }
}

fn render_dns_record(record: &DnsRecord, resources: &mut Map<String, Value>) {
    resources.insert(
        record.logical_id.clone(),
        json!({
            "Type": "AWS::Route53::RecordSet",
            "Properties": {
                "HostedZoneId": record.zone_id,
                "Name": format!("{}.", record.fqdn()),
                "Type": "A",
                "TTL": "300",
                "ResourceRecords": [{
                    "Fn::GetAtt": [format!("{}NetworkInterface", record.target), "PrimaryPrivateIpAddress"]
                }],
            }
        }),
    );
}

fn render_log_group(group: &LogGroup, resources: &mut Map<String, Value>) {
    resources.insert(
        group.logical_id.clone(),
        json!({
            "Type": "AWS::Logs::LogGroup",
            "Properties": {
                "LogGroupName": group.name,
                "RetentionInDays": group.retention_days,
            },
            "DeletionPolicy": "Retain",
            "UpdateReplacePolicy": "Retain",
        }),
    );
}

fn render_ingress(rule: &IngressRule, resources: &mut Map<String, Value>) {
    let logical_id = format!(
        "{}Ingress{}From{}",
        alphanumeric(&rule.destination.to_string()),
        rule.port.from,
        alphanumeric(&rule.source.to_string())
    );
    let protocol = match rule.port.protocol {
        Protocol::Tcp => "tcp",
        Protocol::Udp => "udp",
    };
    resources.insert(
        logical_id,
        json!({
            "Type": "AWS::EC2::SecurityGroupIngress",
            "Properties": {
                "GroupId": group_id(&rule.destination),
                "SourceSecurityGroupId": group_id(&rule.source),
                "IpProtocol": protocol,
                "FromPort": rule.port.from,
                "ToPort": rule.port.to,
                "Description": format!("{} from {}", rule.port, rule.source),
            }
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AssetCache;
    use crate::domain::instance::{InstanceProps, PolicyStatement};
    use crate::domain::network::{Network, Port, Subnet, SubnetType};
    use crate::domain::stack::StackEnvironment;

    fn stack() -> Stack {
        let subnet = Subnet {
            id: "subnet-a".to_string(),
            availability_zone: "us-west-2a".to_string(),
            subnet_type: SubnetType::Private,
            group: None,
        };
        let mut stack = Stack::new(
            "Storage",
            StackEnvironment::new("123456789012", "us-west-2"),
            Network::new("vpc-1", vec![subnet.clone()]),
            AssetCache::new(),
        )
        .unwrap();
        let worker = stack.add_instance(InstanceProps::new("Worker", subnet)).unwrap();
        let instance = stack.instance_mut(&worker).unwrap();
        instance.user_data_mut().add_commands(["TMPDIR=$(mktemp -d)", "echo {{ref:WorkerVolume}}"]);
        instance
            .role_mut()
            .add_statement(PolicyStatement::allow(["s3:GetObject*"], ["arn:aws:s3:::bucket/key"]));
        stack
    }

    #[test]
    fn test_render_string_without_references() {
        assert_eq!(render_string("echo ${HOME}"), Value::String("echo ${HOME}".to_string()));
    }

    #[test]
    fn test_render_string_escapes_shell_variables() {
        let rendered = render_string("cp ${TMPDIR}/a '{{ref:DataVolume}}'");
        assert_eq!(rendered, json!({ "Fn::Sub": "cp ${!TMPDIR}/a '${DataVolume}'" }));
    }

    #[test]
    fn test_instance_resources() {
        let template = CloudFormationTemplate::from_stack(&stack());

        for id in [
            "WorkerSecurityGroup",
            "WorkerRole",
            "WorkerDefaultPolicy",
            "WorkerInstanceProfile",
            "WorkerNetworkInterface",
            "WorkerInstance",
        ] {
            assert!(template.resource(id).is_some(), "missing {}", id);
        }

        let instance = template.resource("WorkerInstance").unwrap();
        assert_eq!(instance["Properties"]["InstanceType"], "t3.large");
        assert_eq!(instance["DependsOn"], json!(["WorkerDefaultPolicy"]));
        assert!(instance.get("CreationPolicy").is_none());
        let user_data = &instance["Properties"]["UserData"]["Fn::Base64"]["Fn::Sub"];
        assert_eq!(
            user_data,
            "#!/bin/bash\nTMPDIR=$(mktemp -d)\necho ${WorkerVolume}"
        );
    }

    #[test]
    fn test_ingress_rules_rendered() {
        let mut stack = stack();
        stack.network_policy_mut().allow(
            &SecurityGroupRef::Declared("WorkerSecurityGroup".to_string()),
            &SecurityGroupRef::Imported("sg-0456".to_string()),
            Port::tcp(988),
        );
        let template = CloudFormationTemplate::from_stack(&stack);

        let rule = template
            .resource("sg0456Ingress988FromWorkerSecurityGroup")
            .unwrap();
        assert_eq!(rule["Properties"]["GroupId"], "sg-0456");
        assert_eq!(
            rule["Properties"]["SourceSecurityGroupId"],
            json!({ "Fn::GetAtt": ["WorkerSecurityGroup", "GroupId"] })
        );
    }

    #[test]
    fn test_rendering_is_stable() {
        let stack = stack();
        let a = CloudFormationTemplate::from_stack(&stack).to_json_pretty().unwrap();
        let b = CloudFormationTemplate::from_stack(&stack).to_json_pretty().unwrap();
        assert_eq!(a, b);
    }
}
