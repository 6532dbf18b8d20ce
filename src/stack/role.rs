// ABOUTME: IAM role assumed by ECS to pull images and write logs for the tasks.
// ABOUTME: Trusts only the ECS tasks service and carries the managed execution policy.

use serde_json::{Value, json};

use crate::engine::ResourceType;
use crate::resource::{Context, DeployError, Inputs, Output, Resource, ResourceOptions};
use crate::types::Arn;

pub const ROLE_NAME: &str = "task-exec-role";
pub const POLICY_ATTACHMENT_NAME: &str = "task-exec-policy";

pub const EXECUTION_POLICY_ARN: &str =
    "arn:aws:iam::aws:policy/service-role/AmazonECSTaskExecutionRolePolicy";

const ECS_TASKS_PRINCIPAL: &str = "ecs-tasks.amazonaws.com";

/// Trust policy allowing only the ECS tasks service to assume the role.
pub fn assume_role_policy() -> Value {
    json!({
        "Version": "2008-10-17",
        "Statement": [{
            "Sid": "",
            "Effect": "Allow",
            "Principal": { "Service": ECS_TASKS_PRINCIPAL },
            "Action": "sts:AssumeRole",
        }],
    })
}

#[derive(Debug, Clone)]
pub struct ExecutionRole {
    role: Resource,
    attachment: Resource,
}

impl ExecutionRole {
    pub fn arn(&self) -> Output<Arn> {
        self.role.output("arn")
    }

    pub fn role(&self) -> &Resource {
        &self.role
    }

    pub fn policy_attachment(&self) -> &Resource {
        &self.attachment
    }
}

pub fn execution_role(ctx: &Context) -> Result<ExecutionRole, DeployError> {
    let role = ctx.register(
        ROLE_NAME,
        ResourceType::ROLE,
        Inputs::new().set("assumeRolePolicy", assume_role_policy().to_string()),
        ResourceOptions::new(),
    )?;

    let attachment = ctx.register(
        POLICY_ATTACHMENT_NAME,
        ResourceType::ROLE_POLICY_ATTACHMENT,
        Inputs::new()
            .set("role", role.output::<String>("name"))
            .set("policyArn", EXECUTION_POLICY_ARN),
        ResourceOptions::new(),
    )?;

    Ok(ExecutionRole { role, attachment })
}
