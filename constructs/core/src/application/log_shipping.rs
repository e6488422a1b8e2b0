// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Log Shipping
//!
//! Sends an instance's boot and system logs to a per-construct log group
//! through the CloudWatch agent.

use serde_json::json;

use crate::application::ConstructError;
use crate::domain::instance::{InstanceId, PolicyStatement};
use crate::domain::stack::{LogGroup, Stack};

const AGENT_CONFIG_PATH: &str = "/opt/aws/amazon-cloudwatch-agent/etc/amazon-cloudwatch-agent.json";
const AGENT_CTL: &str = "/opt/aws/amazon-cloudwatch-agent/bin/amazon-cloudwatch-agent-ctl";

/// Files shipped from every instance that has log shipping configured
const SHIPPED_FILES: &[(&str, &str)] = &[
    ("/var/log/cloud-init-output.log", "cloud-init-output"),
    ("/var/log/messages", "messages"),
];

/// Ships an instance's boot and system logs to a dedicated log group
#[derive(Debug, Clone)]
pub struct LogShipping {
    log_group: LogGroup,
}

impl LogShipping {
    /// Declare the log group `/<stack>/<construct>` and grant `target` write
    /// access to it.
    pub fn configure(
        stack: &mut Stack,
        target: &InstanceId,
        construct: &str,
        retention_days: u32,
    ) -> Result<Self, ConstructError> {
        let log_group = LogGroup {
            logical_id: format!("{}LogGroup", construct),
            name: format!("/{}/{}", stack.name(), construct),
            retention_days,
        };

        let env = stack.environment().clone();
        stack
            .instance_mut(target)?
            .role_mut()
            .add_statement(PolicyStatement::allow(
                ["logs:CreateLogStream", "logs:PutLogEvents", "logs:DescribeLogStreams"],
                [format!(
                    "arn:aws:logs:{}:{}:log-group:{}:*",
                    env.region, env.account, log_group.name
                )],
            ));
        stack.add_log_group(log_group.clone());

        Ok(Self { log_group })
    }

    pub fn log_group(&self) -> &LogGroup {
        &self.log_group
    }

    /// CloudWatch agent configuration for this log group
    pub fn agent_config(&self) -> serde_json::Value {
        let collect_list: Vec<_> = SHIPPED_FILES
            .iter()
            .map(|(path, stream)| {
                json!({
                    "file_path": path,
                    "log_group_name": self.log_group.name,
                    "log_stream_name": format!("{}-{{instance_id}}", stream),
                    "timezone": "Local",
                })
            })
            .collect();

        json!({
            "logs": {
                "logs_collected": { "files": { "collect_list": collect_list } },
                "log_stream_name": "DefaultLogStream-{instance_id}",
                "force_flush_interval": 15,
            }
        })
    }

    /// Boot commands that install, configure and start the agent
    pub fn commands(&self) -> Vec<String> {
        vec![
            "yum install -y amazon-cloudwatch-agent".to_string(),
            format!("mkdir -p {}", AGENT_CONFIG_PATH.trim_end_matches("/amazon-cloudwatch-agent.json")),
            format!(
                "cat > {} <<'EOF'\n{}\nEOF",
                AGENT_CONFIG_PATH,
                self.agent_config()
            ),
            format!(
                "{} -a fetch-config -m ec2 -s -c file:{}",
                AGENT_CTL, AGENT_CONFIG_PATH
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::asset::AssetCache;
    use crate::domain::instance::InstanceProps;
    use crate::domain::network::{Network, Subnet, SubnetType};
    use crate::domain::stack::StackEnvironment;

    #[test]
    fn test_configure_declares_group_and_grants_writes() {
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
        let server = stack.add_instance(InstanceProps::new("Repository", subnet)).unwrap();

        let shipping = LogShipping::configure(&mut stack, &server, "Repository", 3).unwrap();

        assert_eq!(shipping.log_group().name, "/Storage/Repository");
        assert_eq!(stack.log_groups().len(), 1);
        let statements = stack.instance(&server).unwrap().role().statements();
        assert!(statements[0].actions.contains(&"logs:PutLogEvents".to_string()));

        let commands = shipping.commands();
        assert!(commands[2].contains("\"log_group_name\":\"/Storage/Repository\""));
        assert!(commands[2].contains("cloud-init-output-{instance_id}"));
        assert!(commands[3].ends_with("file:/opt/aws/amazon-cloudwatch-agent/etc/amazon-cloudwatch-agent.json"));
    }
}
