// ABOUTME: Resolves the account's default VPC and its subnets.
// ABOUTME: Resolved eagerly; every network-attached resource consumes the result.

use nonempty::NonEmpty;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::engine::{PropertyMap, functions};
use crate::resource::{Context, DeployError};
use crate::types::{SubnetId, VpcId};

/// The default VPC and its subnets, in the order the provider reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub vpc_id: VpcId,
    pub subnets: NonEmpty<SubnetId>,
}

impl Network {
    /// Subnet IDs as a JSON array, order preserved.
    pub fn subnet_ids(&self) -> Value {
        Value::Array(
            self.subnets
                .iter()
                .map(|id| Value::from(id.as_str()))
                .collect(),
        )
    }
}

/// Look up the default VPC and its subnets.
///
/// Exactly one default VPC must exist. An ambiguous lookup is an error rather
/// than a guess.
pub async fn resolve_default_network(ctx: &Context) -> Result<Network, DeployError> {
    let mut args = PropertyMap::new();
    args.insert("default".to_string(), json!(true));
    let vpcs = ctx
        .invoke(functions::GET_VPCS, args)
        .await
        .map_err(|e| DeployError::Lookup(format!("default VPC lookup failed: {e}")))?;
    let vpcs = ids(&vpcs, "VPC")?;

    let vpc_id = match vpcs.as_slice() {
        [] => return Err(DeployError::Lookup("no default VPC found".to_string())),
        [only] => VpcId::new(only.as_str()),
        many => {
            return Err(DeployError::Lookup(format!(
                "expected exactly one default VPC, found {}: {}",
                many.len(),
                many.join(", ")
            )));
        }
    };
    debug!(vpc = %vpc_id, "resolved default VPC");

    let mut args = PropertyMap::new();
    args.insert("vpcId".to_string(), json!(vpc_id.as_str()));
    let subnets = ctx
        .invoke(functions::GET_SUBNET_IDS, args)
        .await
        .map_err(|e| DeployError::Lookup(format!("subnet lookup for {vpc_id} failed: {e}")))?;
    let subnets = ids(&subnets, "subnet")?
        .into_iter()
        .map(SubnetId::new)
        .collect::<Vec<_>>();

    let subnets = NonEmpty::from_vec(subnets)
        .ok_or_else(|| DeployError::Lookup(format!("default VPC {vpc_id} has no subnets")))?;

    info!(vpc = %vpc_id, subnets = subnets.len(), "resolved default network");
    Ok(Network { vpc_id, subnets })
}

fn ids(result: &PropertyMap, what: &str) -> Result<Vec<String>, DeployError> {
    let malformed = || DeployError::Lookup(format!("malformed {what} lookup result"));
    result
        .get("ids")
        .and_then(Value::as_array)
        .ok_or_else(malformed)?
        .iter()
        .map(|id| id.as_str().map(str::to_string).ok_or_else(malformed))
        .collect()
}
