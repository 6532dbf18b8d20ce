// ABOUTME: In-memory provisioning engine used for previews and tests.
// ABOUTME: Synthesizes deterministic outputs, keeps state across runs, and records a trace.

use async_trait::async_trait;
use base64::Engine as _;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::{Engine, EngineError, PropertyMap, RegisterRequest, ResourceType, functions};
use crate::types::ResourceName;

const DEFAULT_ACCOUNT: &str = "123456789012";
const DEFAULT_REGION: &str = "us-east-1";

/// What the engine did with a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Same,
}

/// One observable engine call, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    Invoked {
        function: String,
    },
    Realized {
        name: ResourceName,
        ty: ResourceType,
        operation: Operation,
    },
    Failed {
        name: ResourceName,
    },
}

/// Engine state for one realized resource.
#[derive(Debug, Clone)]
pub struct RealizedResource {
    pub ty: ResourceType,
    pub inputs: PropertyMap,
    pub outputs: PropertyMap,
    pub dependencies: Vec<ResourceName>,
}

/// A provisioning engine that keeps everything in memory.
///
/// Physical names and identifiers are derived from logical names only, so
/// repeated runs against the same engine converge on the same resources.
pub struct MemoryEngine {
    account: String,
    region: String,
    default_vpcs: Vec<String>,
    subnets: Vec<String>,
    authorization_token: String,
    credential_failure: Option<String>,
    latency: HashMap<String, Duration>,
    failures: HashMap<String, String>,
    state: Mutex<BTreeMap<ResourceName, RealizedResource>>,
    trace: Mutex<Vec<TraceEvent>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// An engine with one default VPC holding two subnets.
    pub fn new() -> Self {
        Self {
            account: DEFAULT_ACCOUNT.to_string(),
            region: DEFAULT_REGION.to_string(),
            default_vpcs: vec!["vpc-0a1b2c3d".to_string()],
            subnets: vec!["subnet-0a1b2c3d".to_string(), "subnet-4e5f6a7b".to_string()],
            authorization_token: base64::engine::general_purpose::STANDARD
                .encode("AWS:preview-token"),
            credential_failure: None,
            latency: HashMap::new(),
            failures: HashMap::new(),
            state: Mutex::new(BTreeMap::new()),
            trace: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default_vpcs<I, S>(mut self, vpcs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_vpcs = vpcs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_subnets<I, S>(mut self, subnets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subnets = subnets.into_iter().map(Into::into).collect();
        self
    }

    /// Token returned by the registry credential lookup, already base64 encoded.
    pub fn with_authorization_token(mut self, token: impl Into<String>) -> Self {
        self.authorization_token = token.into();
        self
    }

    pub fn with_credential_failure(mut self, message: impl Into<String>) -> Self {
        self.credential_failure = Some(message.into());
        self
    }

    /// Delay the realization of one resource.
    pub fn with_latency(mut self, name: &str, delay: Duration) -> Self {
        self.latency.insert(name.to_string(), delay);
        self
    }

    /// Reject the realization of one resource.
    pub fn with_failure(mut self, name: &str, message: impl Into<String>) -> Self {
        self.failures.insert(name.to_string(), message.into());
        self
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        self.trace.lock().clone()
    }

    pub fn clear_trace(&self) {
        self.trace.lock().clear();
    }

    /// Names of realized resources, in the order they completed.
    pub fn realization_order(&self) -> Vec<ResourceName> {
        self.trace
            .lock()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Realized { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn realized(&self, name: &str) -> Option<RealizedResource> {
        let name = ResourceName::new(name).ok()?;
        self.state.lock().get(&name).cloned()
    }

    pub fn resource_names(&self) -> Vec<ResourceName> {
        self.state.lock().keys().cloned().collect()
    }

    fn outputs_for(
        &self,
        request: &RegisterRequest,
        prior: Option<&RealizedResource>,
    ) -> PropertyMap {
        let name = request.name.as_str();
        let hash = digest(name);
        let physical = format!("{name}-{}", &hash[..7]);
        let (account, region) = (&self.account, &self.region);

        let mut outputs = request.inputs.clone();
        let mut set = |key: &str, value: Value| {
            outputs.insert(key.to_string(), value);
        };

        set(
            "urn",
            json!(format!("urn:skiff:{region}::{}::{name}", request.ty)),
        );

        match request.ty {
            ResourceType::SECURITY_GROUP => {
                let id = format!("sg-{}", &hash[..16]);
                set(
                    "arn",
                    json!(format!(
                        "arn:aws:ec2:{region}:{account}:security-group/{id}"
                    )),
                );
                set("id", json!(id));
            }
            ResourceType::ROLE => {
                set("id", json!(physical));
                set("name", json!(physical));
                set("arn", json!(format!("arn:aws:iam::{account}:role/{physical}")));
            }
            ResourceType::ROLE_POLICY_ATTACHMENT => {
                set("id", json!(format!("{physical}-{}", &hash[7..15])));
            }
            ResourceType::LOAD_BALANCER => {
                let arn = format!(
                    "arn:aws:elasticloadbalancing:{region}:{account}:loadbalancer/app/{physical}/{}",
                    &hash[..16]
                );
                set("id", json!(arn));
                set("arn", json!(arn));
                set(
                    "dnsName",
                    json!(format!(
                        "{physical}-{}.{region}.elb.amazonaws.com",
                        u64::from_str_radix(&hash[..8], 16).unwrap_or_default()
                    )),
                );
            }
            ResourceType::TARGET_GROUP => {
                let arn = format!(
                    "arn:aws:elasticloadbalancing:{region}:{account}:targetgroup/{physical}/{}",
                    &hash[..16]
                );
                set("id", json!(arn));
                set("arn", json!(arn));
            }
            ResourceType::LISTENER => {
                let arn = format!(
                    "arn:aws:elasticloadbalancing:{region}:{account}:listener/app/{physical}/{}",
                    &hash[..16]
                );
                set("id", json!(arn));
                set("arn", json!(arn));
            }
            ResourceType::REPOSITORY => {
                set("id", json!(physical));
                set("name", json!(physical));
                set("registryId", json!(account));
                set(
                    "repositoryUrl",
                    json!(format!(
                        "{account}.dkr.ecr.{region}.amazonaws.com/{physical}"
                    )),
                );
                set(
                    "arn",
                    json!(format!(
                        "arn:aws:ecr:{region}:{account}:repository/{physical}"
                    )),
                );
            }
            ResourceType::CLUSTER => {
                let arn = format!("arn:aws:ecs:{region}:{account}:cluster/{physical}");
                set("id", json!(arn));
                set("arn", json!(arn));
                set("name", json!(physical));
            }
            ResourceType::TASK_DEFINITION => {
                let family = request
                    .inputs
                    .get("family")
                    .and_then(Value::as_str)
                    .unwrap_or(name);
                let revision = prior
                    .and_then(|p| p.outputs.get("revision"))
                    .and_then(Value::as_u64)
                    .map_or(1, |r| r + 1);
                let arn =
                    format!("arn:aws:ecs:{region}:{account}:task-definition/{family}:{revision}");
                set("id", json!(family));
                set("arn", json!(arn));
                set("revision", json!(revision));
            }
            ResourceType::SERVICE => {
                set(
                    "id",
                    json!(format!("arn:aws:ecs:{region}:{account}:service/{physical}")),
                );
                set("name", json!(physical));
            }
            _ => {
                set("id", json!(physical));
            }
        }

        outputs
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// 64-bit FNV-1a, continued from `state`.
fn fnv1a(state: u64, bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(state, |hash, &byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
}

/// Hex digest of a logical name, identical across runs, hosts and toolchains.
fn digest(name: &str) -> String {
    let high = fnv1a(FNV_OFFSET_BASIS, name.as_bytes());
    let low = fnv1a(high, b"skiff");
    format!("{high:016x}{low:016x}")
}

#[async_trait]
impl Engine for MemoryEngine {
    async fn register(&self, request: RegisterRequest) -> Result<PropertyMap, EngineError> {
        if let Some(delay) = self.latency.get(request.name.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        if let Some(message) = self.failures.get(request.name.as_str()) {
            self.trace.lock().push(TraceEvent::Failed {
                name: request.name.clone(),
            });
            return Err(EngineError::Rejected(message.clone()));
        }

        let (operation, outputs) = {
            let state = self.state.lock();
            match state.get(&request.name) {
                Some(prior) if prior.ty == request.ty && prior.inputs == request.inputs => {
                    (Operation::Same, prior.outputs.clone())
                }
                Some(prior) if prior.ty == request.ty => {
                    (Operation::Update, self.outputs_for(&request, Some(prior)))
                }
                _ => (Operation::Create, self.outputs_for(&request, None)),
            }
        };

        tracing::debug!(resource = %request.name, ?operation, "memory engine realized resource");

        self.state.lock().insert(
            request.name.clone(),
            RealizedResource {
                ty: request.ty,
                inputs: request.inputs,
                outputs: outputs.clone(),
                dependencies: request.dependencies,
            },
        );
        self.trace.lock().push(TraceEvent::Realized {
            name: request.name,
            ty: request.ty,
            operation,
        });

        Ok(outputs)
    }

    async fn invoke(&self, function: &str, args: PropertyMap) -> Result<PropertyMap, EngineError> {
        self.trace.lock().push(TraceEvent::Invoked {
            function: function.to_string(),
        });

        let mut result = PropertyMap::new();
        match function {
            functions::GET_VPCS => {
                let only_default = args.get("default").and_then(Value::as_bool);
                if only_default != Some(true) {
                    return Err(EngineError::InvalidArguments(
                        "only default VPC lookups are supported".to_string(),
                    ));
                }
                result.insert("ids".to_string(), json!(self.default_vpcs));
            }
            functions::GET_SUBNET_IDS => {
                let vpc = args
                    .get("vpcId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| EngineError::InvalidArguments("vpcId is required".to_string()))?;
                let ids: &[String] = if self.default_vpcs.iter().any(|v| v == vpc) {
                    &self.subnets
                } else {
                    &[]
                };
                result.insert("ids".to_string(), json!(ids));
            }
            functions::GET_CREDENTIALS => {
                let registry = args
                    .get("registryId")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        EngineError::InvalidArguments("registryId is required".to_string())
                    })?;
                if let Some(ref message) = self.credential_failure {
                    return Err(EngineError::Rejected(message.clone()));
                }
                result.insert(
                    "authorizationToken".to_string(),
                    json!(self.authorization_token),
                );
                result.insert(
                    "proxyEndpoint".to_string(),
                    json!(format!(
                        "https://{registry}.dkr.ecr.{}.amazonaws.com",
                        self.region
                    )),
                );
            }
            other => return Err(EngineError::UnknownFunction(other.to_string())),
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, ty: ResourceType, inputs: PropertyMap) -> RegisterRequest {
        RegisterRequest {
            name: ResourceName::new(name).unwrap(),
            ty,
            inputs,
            dependencies: Vec::new(),
        }
    }

    #[test]
    fn digest_is_fixed_for_a_name() {
        assert_eq!(digest("app-cluster"), "b0679aa3a7ef142be3cf78f043f6bacc");
    }

    #[tokio::test]
    async fn physical_names_do_not_depend_on_the_engine_instance() {
        let outputs = MemoryEngine::new()
            .register(request("app-cluster", ResourceType::CLUSTER, PropertyMap::new()))
            .await
            .unwrap();
        assert_eq!(outputs["name"], json!("app-cluster-b0679aa"));
    }

    #[tokio::test]
    async fn outputs_are_stable_across_registrations() {
        let engine = MemoryEngine::new();
        let first = engine
            .register(request("web-lb", ResourceType::LOAD_BALANCER, PropertyMap::new()))
            .await
            .unwrap();
        let second = engine
            .register(request("web-lb", ResourceType::LOAD_BALANCER, PropertyMap::new()))
            .await
            .unwrap();

        assert_eq!(first["dnsName"], second["dnsName"]);
        assert!(matches!(
            engine.trace().last(),
            Some(TraceEvent::Realized {
                operation: Operation::Same,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn changed_inputs_update_task_definition_revision() {
        let engine = MemoryEngine::new();
        let mut inputs = PropertyMap::new();
        inputs.insert("family".into(), json!("fargate-task-definition"));
        let first = engine
            .register(request("app-task", ResourceType::TASK_DEFINITION, inputs.clone()))
            .await
            .unwrap();
        inputs.insert("cpu".into(), json!("512"));
        let second = engine
            .register(request("app-task", ResourceType::TASK_DEFINITION, inputs))
            .await
            .unwrap();

        assert_eq!(
            first["arn"],
            json!("arn:aws:ecs:us-east-1:123456789012:task-definition/fargate-task-definition:1")
        );
        assert_eq!(second["revision"], json!(2));
    }

    #[tokio::test]
    async fn injected_failure_is_rejected() {
        let engine = MemoryEngine::new().with_failure("app-cluster", "quota exceeded");
        let err = engine
            .register(request("app-cluster", ResourceType::CLUSTER, PropertyMap::new()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "rejected by provider: quota exceeded");
        assert!(engine.realized("app-cluster").is_none());
    }

    #[tokio::test]
    async fn subnet_lookup_requires_known_vpc() {
        let engine = MemoryEngine::new().with_subnets(["subnet-a", "subnet-b"]);
        let mut args = PropertyMap::new();
        args.insert("vpcId".into(), json!("vpc-0a1b2c3d"));
        let found = engine
            .invoke(functions::GET_SUBNET_IDS, args.clone())
            .await
            .unwrap();
        assert_eq!(found["ids"], json!(["subnet-a", "subnet-b"]));

        args.insert("vpcId".into(), json!("vpc-other"));
        let missing = engine
            .invoke(functions::GET_SUBNET_IDS, args)
            .await
            .unwrap();
        assert_eq!(missing["ids"], json!([]));
    }

    #[tokio::test]
    async fn unknown_function_is_an_error() {
        let engine = MemoryEngine::new();
        let err = engine
            .invoke("aws:s3/getBucket:getBucket", PropertyMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownFunction(_)));
    }
}
