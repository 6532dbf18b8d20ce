// ABOUTME: ECS cluster, Fargate task definition, and the load-balanced service.
// ABOUTME: The service is ordered after the listener so targets register against a live listener.

use serde_json::json;

use super::image::ImagePipeline;
use super::load_balancer::LoadBalancerPipeline;
use super::network::Network;
use super::role::ExecutionRole;
use super::security::SecurityGroup;
use crate::config::StackConfig;
use crate::engine::ResourceType;
use crate::resource::{Context, DeployError, Inputs, Resource, ResourceOptions};
use crate::types::Arn;

pub const CLUSTER_NAME: &str = "app-cluster";
pub const TASK_DEFINITION_NAME: &str = "app-task";
pub const SERVICE_NAME: &str = "app-service";

pub const TASK_FAMILY: &str = "fargate-task-definition";
const FARGATE: &str = "FARGATE";

#[derive(Debug, Clone)]
pub struct ServiceOrchestrator {
    cluster: Resource,
    task_definition: Resource,
    service: Resource,
}

impl ServiceOrchestrator {
    pub fn cluster(&self) -> &Resource {
        &self.cluster
    }

    pub fn task_definition(&self) -> &Resource {
        &self.task_definition
    }

    pub fn service(&self) -> &Resource {
        &self.service
    }
}

/// Everything the service orchestrator consumes from the other builders.
pub struct ServiceDependencies<'a> {
    pub network: &'a Network,
    pub security_group: &'a SecurityGroup,
    pub role: &'a ExecutionRole,
    pub load_balancer: &'a LoadBalancerPipeline,
    pub image: &'a ImagePipeline,
}

pub fn service(
    ctx: &Context,
    config: &StackConfig,
    deps: ServiceDependencies<'_>,
) -> Result<ServiceOrchestrator, DeployError> {
    let cluster = ctx.register(
        CLUSTER_NAME,
        ResourceType::CLUSTER,
        Inputs::new(),
        ResourceOptions::new(),
    )?;

    let task_definition = ctx.register(
        TASK_DEFINITION_NAME,
        ResourceType::TASK_DEFINITION,
        Inputs::new()
            .set("family", TASK_FAMILY)
            .set("cpu", config.cpu.to_string())
            .set("memory", config.memory.to_string())
            .set("networkMode", "awsvpc")
            .set("requiresCompatibilities", json!([FARGATE]))
            .set("executionRoleArn", deps.role.arn())
            .set("containerDefinitions", deps.image.container_definitions()),
        ResourceOptions::new(),
    )?;

    let subnets = deps.network.subnet_ids();
    let network_configuration = deps.security_group.id().map(move |id| {
        json!({
            "assignPublicIp": true,
            "subnets": subnets,
            "securityGroups": [id.as_str()],
        })
    });

    // Same container definition the task definition renders.
    let load_balancers = deps
        .image
        .container()
        .zip(&deps.load_balancer.target_group_arn())
        .map(|(container, target_group_arn)| vec![container.attachment(target_group_arn)]);

    let service = ctx.register(
        SERVICE_NAME,
        ResourceType::SERVICE,
        Inputs::new()
            .set("cluster", cluster.output::<Arn>("arn"))
            .set("desiredCount", config.replicas)
            .set("launchType", FARGATE)
            .set("taskDefinition", task_definition.output::<Arn>("arn"))
            .set("networkConfiguration", network_configuration)
            .set("loadBalancers", load_balancers),
        ResourceOptions::new().depends_on(deps.load_balancer.listener()),
    )?;

    Ok(ServiceOrchestrator {
        cluster,
        task_definition,
        service,
    })
}
