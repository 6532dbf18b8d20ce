// ABOUTME: Interface to the external provisioning engine.
// ABOUTME: Declares resources, invokes provider lookups, and names the resource type tokens.

mod memory;

pub use memory::{MemoryEngine, Operation, RealizedResource, TraceEvent};

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;

use crate::types::ResourceName;

/// Resolved resource inputs or outputs, keyed by provider property name.
pub type PropertyMap = Map<String, Value>;

/// Provider type token of a resource, e.g. `aws:ecs/service:Service`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceType(&'static str);

impl ResourceType {
    pub const SECURITY_GROUP: Self = Self("aws:ec2/securityGroup:SecurityGroup");
    pub const ROLE: Self = Self("aws:iam/role:Role");
    pub const ROLE_POLICY_ATTACHMENT: Self =
        Self("aws:iam/rolePolicyAttachment:RolePolicyAttachment");
    pub const LOAD_BALANCER: Self = Self("aws:lb/loadBalancer:LoadBalancer");
    pub const TARGET_GROUP: Self = Self("aws:lb/targetGroup:TargetGroup");
    pub const LISTENER: Self = Self("aws:lb/listener:Listener");
    pub const REPOSITORY: Self = Self("aws:ecr/repository:Repository");
    pub const IMAGE: Self = Self("docker:index/image:Image");
    pub const CLUSTER: Self = Self("aws:ecs/cluster:Cluster");
    pub const TASK_DEFINITION: Self = Self("aws:ecs/taskDefinition:TaskDefinition");
    pub const SERVICE: Self = Self("aws:ecs/service:Service");

    pub const fn new(token: &'static str) -> Self {
        Self(token)
    }

    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Provider lookup function tokens.
pub mod functions {
    pub const GET_VPCS: &str = "aws:ec2/getVpcs:getVpcs";
    pub const GET_SUBNET_IDS: &str = "aws:ec2/getSubnetIds:getSubnetIds";
    pub const GET_CREDENTIALS: &str = "aws:ecr/getCredentials:getCredentials";
}

/// A declaration handed to the engine once all of its inputs have resolved.
#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub name: ResourceName,
    pub ty: ResourceType,
    pub inputs: PropertyMap,
    /// Every resource this one was ordered after, by data or by declaration.
    pub dependencies: Vec<ResourceName>,
}

/// Errors reported by the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("rejected by provider: {0}")]
    Rejected(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

/// The provisioning engine: reconciles declared resources against live
/// infrastructure and answers provider lookups.
///
/// Ordering is the caller's job. `register` is only called after every
/// dependency of the request has been realized.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Create or update a resource to match the request. Returns its outputs.
    async fn register(&self, request: RegisterRequest) -> Result<PropertyMap, EngineError>;

    /// Call a provider lookup function.
    async fn invoke(&self, function: &str, args: PropertyMap) -> Result<PropertyMap, EngineError>;
}
