// ABOUTME: Security group admitting the service port from anywhere.
// ABOUTME: Shared by the load balancer and the service tasks.

use serde_json::json;

use super::network::Network;
use crate::engine::ResourceType;
use crate::resource::{Context, DeployError, Inputs, Output, Resource, ResourceOptions};
use crate::types::SecurityGroupId;

pub const SECURITY_GROUP_NAME: &str = "web-sg";

const ANYWHERE: &str = "0.0.0.0/0";

#[derive(Debug, Clone)]
pub struct SecurityGroup {
    resource: Resource,
}

impl SecurityGroup {
    pub fn id(&self) -> Output<SecurityGroupId> {
        self.resource.output("id")
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }
}

/// Declare the group: TCP ingress on `port` from anywhere, all egress.
pub fn security_group(
    ctx: &Context,
    network: &Network,
    port: u16,
) -> Result<SecurityGroup, DeployError> {
    let inputs = Inputs::new()
        .set("vpcId", network.vpc_id.as_str())
        .set(
            "ingress",
            json!([{
                "protocol": "tcp",
                "fromPort": port,
                "toPort": port,
                "cidrBlocks": [ANYWHERE],
            }]),
        )
        .set(
            "egress",
            json!([{
                "protocol": "-1",
                "fromPort": 0,
                "toPort": 0,
                "cidrBlocks": [ANYWHERE],
            }]),
        );

    let resource = ctx.register(
        SECURITY_GROUP_NAME,
        ResourceType::SECURITY_GROUP,
        inputs,
        ResourceOptions::new(),
    )?;
    Ok(SecurityGroup { resource })
}
