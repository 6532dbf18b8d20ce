// ABOUTME: The Fargate web service topology and the deployment driver.
// ABOUTME: One composition function declares every resource; the driver awaits completion.

mod container_def;
mod image;
mod load_balancer;
mod network;
mod role;
mod security;
mod service;

pub use container_def::{ContainerDefinition, LoadBalancerAttachment, PortMapping};
pub use image::{IMAGE_NAME, ImagePipeline, REPOSITORY_NAME, image_pipeline};
pub use load_balancer::{
    LISTENER_NAME, LOAD_BALANCER_NAME, LoadBalancerPipeline, TARGET_GROUP_NAME, load_balancer,
};
pub use network::{Network, resolve_default_network};
pub use role::{
    EXECUTION_POLICY_ARN, ExecutionRole, POLICY_ATTACHMENT_NAME, ROLE_NAME, assume_role_policy,
    execution_role,
};
pub use security::{SECURITY_GROUP_NAME, SecurityGroup, security_group};
pub use service::{
    CLUSTER_NAME, SERVICE_NAME, ServiceDependencies, ServiceOrchestrator, TASK_DEFINITION_NAME,
    TASK_FAMILY, service,
};

use std::sync::Arc;

use tracing::info;

use crate::config::StackConfig;
use crate::engine::Engine;
use crate::image::ImageBuilder;
use crate::resource::{Context, DeployError, ResourceGraph, StackOutputs};

/// Name of the exported load balancer address.
pub const URL_OUTPUT: &str = "url";

/// Handles to every declared component.
#[derive(Debug, Clone)]
pub struct Stack {
    pub network: Network,
    pub security_group: SecurityGroup,
    pub role: ExecutionRole,
    pub load_balancer: LoadBalancerPipeline,
    pub image: ImagePipeline,
    pub service: ServiceOrchestrator,
}

/// Result of a completed deployment.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub outputs: StackOutputs,
    pub graph: ResourceGraph,
}

/// Declare the whole topology.
///
/// Only the network lookup is awaited here. Everything else is declared
/// without blocking and realizes as its inputs become available.
pub async fn declare(
    ctx: &Context,
    config: &StackConfig,
    builder: Arc<dyn ImageBuilder>,
) -> Result<Stack, DeployError> {
    let network = resolve_default_network(ctx).await?;

    let security_group = security_group(ctx, &network, config.port)?;
    let role = execution_role(ctx)?;
    let load_balancer = load_balancer(ctx, &network, &security_group, config.port)?;
    let image = image_pipeline(ctx, config, builder)?;
    let service = service(
        ctx,
        config,
        ServiceDependencies {
            network: &network,
            security_group: &security_group,
            role: &role,
            load_balancer: &load_balancer,
            image: &image,
        },
    )?;

    ctx.export(URL_OUTPUT, load_balancer.dns_name());

    Ok(Stack {
        network,
        security_group,
        role,
        load_balancer,
        image,
        service,
    })
}

/// Declare the topology against `engine` and wait for every resource.
pub async fn deploy(
    engine: Arc<dyn Engine>,
    builder: Arc<dyn ImageBuilder>,
    config: &StackConfig,
) -> Result<Deployment, DeployError> {
    info!(
        replicas = config.replicas,
        port = config.port,
        "declaring stack"
    );

    let ctx = Context::new(engine);
    declare(&ctx, config, builder).await?;
    let graph = ctx.graph();
    let outputs = ctx.finish().await?;

    Ok(Deployment { outputs, graph })
}
