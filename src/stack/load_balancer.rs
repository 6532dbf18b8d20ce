// ABOUTME: Application load balancer, IP target group, and forwarding listener.
// ABOUTME: The listener is exposed so the service can be ordered after it.

use serde_json::json;

use super::network::Network;
use super::security::SecurityGroup;
use crate::engine::ResourceType;
use crate::resource::{Context, DeployError, Inputs, Output, Resource, ResourceOptions};
use crate::types::Arn;

pub const LOAD_BALANCER_NAME: &str = "web-lb";
pub const TARGET_GROUP_NAME: &str = "web-tg";
pub const LISTENER_NAME: &str = "web-listener";

#[derive(Debug, Clone)]
pub struct LoadBalancerPipeline {
    load_balancer: Resource,
    target_group: Resource,
    listener: Resource,
}

impl LoadBalancerPipeline {
    /// Public DNS name of the load balancer.
    pub fn dns_name(&self) -> Output<String> {
        self.load_balancer.output("dnsName")
    }

    pub fn target_group_arn(&self) -> Output<Arn> {
        self.target_group.output("arn")
    }

    pub fn load_balancer(&self) -> &Resource {
        &self.load_balancer
    }

    pub fn target_group(&self) -> &Resource {
        &self.target_group
    }

    /// The listener. Targets only receive traffic once it exists.
    pub fn listener(&self) -> &Resource {
        &self.listener
    }
}

pub fn load_balancer(
    ctx: &Context,
    network: &Network,
    security_group: &SecurityGroup,
    port: u16,
) -> Result<LoadBalancerPipeline, DeployError> {
    let load_balancer = ctx.register(
        LOAD_BALANCER_NAME,
        ResourceType::LOAD_BALANCER,
        Inputs::new()
            .set("subnets", network.subnet_ids())
            .set("securityGroups", security_group.id().map(|id| vec![id])),
        ResourceOptions::new(),
    )?;

    let target_group = ctx.register(
        TARGET_GROUP_NAME,
        ResourceType::TARGET_GROUP,
        Inputs::new()
            .set("port", port)
            .set("protocol", "HTTP")
            .set("targetType", "ip")
            .set("vpcId", network.vpc_id.as_str()),
        ResourceOptions::new(),
    )?;

    let forward = target_group.output::<Arn>("arn").map(|arn| {
        json!([{
            "type": "forward",
            "targetGroupArn": arn.as_str(),
        }])
    });

    let listener = ctx.register(
        LISTENER_NAME,
        ResourceType::LISTENER,
        Inputs::new()
            .set("loadBalancerArn", load_balancer.output::<Arn>("arn"))
            .set("port", port)
            .set("defaultActions", forward),
        ResourceOptions::new(),
    )?;

    Ok(LoadBalancerPipeline {
        load_balancer,
        target_group,
        listener,
    })
}
