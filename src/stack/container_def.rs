// ABOUTME: Container definition document for the task definition.
// ABOUTME: Also derives the service's load balancer attachment so name and port cannot diverge.

use serde::{Deserialize, Serialize};

use crate::types::{Arn, ResourceName};

/// One port exposed by the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
    pub protocol: String,
}

/// The single container run by each task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub port_mappings: Vec<PortMapping>,
}

/// Where the service registers its tasks with the load balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerAttachment {
    pub target_group_arn: Arn,
    pub container_name: String,
    pub container_port: u16,
}

impl ContainerDefinition {
    /// A container publishing `port` over TCP on the same host port, as
    /// `awsvpc` networking requires.
    pub fn new(name: &ResourceName, image: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.to_string(),
            image: image.into(),
            port_mappings: vec![PortMapping {
                container_port: port,
                host_port: port,
                protocol: "tcp".to_string(),
            }],
        }
    }

    /// The port traffic is forwarded to.
    pub fn port(&self) -> u16 {
        self.port_mappings
            .first()
            .map(|mapping| mapping.container_port)
            .unwrap_or_default()
    }

    pub fn attachment(&self, target_group_arn: Arn) -> LoadBalancerAttachment {
        LoadBalancerAttachment {
            target_group_arn,
            container_name: self.name.clone(),
            container_port: self.port(),
        }
    }

    /// Render as the JSON array string a task definition expects.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(std::slice::from_ref(self))
    }
}
