// ABOUTME: Integration tests for the Fargate stack against the in-memory engine.
// ABOUTME: Covers wiring, exported outputs, credentials, and failure propagation.

mod support;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use skiff::config::StackConfig;
use skiff::engine::{MemoryEngine, ResourceType, TraceEvent};
use skiff::resource::{DeployError, DeployErrorKind, EdgeKind};
use skiff::stack;
use std::sync::Arc;
use std::time::Duration;
use support::{RecordingBuilder, deploy_default, deploy_with};

fn inputs(engine: &MemoryEngine, name: &str) -> serde_json::Map<String, Value> {
    engine
        .realized(name)
        .unwrap_or_else(|| panic!("{name} was not realized"))
        .inputs
}

fn outputs(engine: &MemoryEngine, name: &str) -> serde_json::Map<String, Value> {
    engine
        .realized(name)
        .unwrap_or_else(|| panic!("{name} was not realized"))
        .outputs
}

mod topology {
    use super::*;

    #[tokio::test]
    async fn declares_every_resource_once() {
        let (engine, builder, deployment) = deploy_default().await;

        let mut declared: Vec<&str> = deployment
            .graph
            .nodes()
            .iter()
            .map(|node| node.name.as_str())
            .collect();
        declared.sort_unstable();
        assert_eq!(
            declared,
            vec![
                "app-cluster",
                "app-repo",
                "app-service",
                "app-task",
                "my-image",
                "task-exec-policy",
                "task-exec-role",
                "web-lb",
                "web-listener",
                "web-sg",
                "web-tg",
            ]
        );

        // The image goes through the build tool, everything else through the engine.
        assert_eq!(engine.resource_names().len(), 10);
        assert_eq!(builder.requests().len(), 1);
    }

    #[tokio::test]
    async fn exports_load_balancer_dns_name_as_url() {
        let (engine, _builder, deployment) = deploy_default().await;

        assert_eq!(deployment.outputs.len(), 1);
        assert_eq!(
            deployment.outputs[stack::URL_OUTPUT],
            outputs(&engine, "web-lb")["dnsName"]
        );
    }

    #[tokio::test]
    async fn records_data_and_ordering_edges() {
        let (_engine, _builder, deployment) = deploy_default().await;
        let graph = &deployment.graph;

        assert!(graph.has_edge("web-listener", "app-service", EdgeKind::Ordering));
        assert!(!graph.has_edge("web-listener", "app-service", EdgeKind::Data));
        assert!(graph.has_edge("task-exec-role", "task-exec-policy", EdgeKind::Data));
        assert!(graph.has_edge("web-tg", "web-listener", EdgeKind::Data));
        assert!(graph.has_edge("web-lb", "web-listener", EdgeKind::Data));
        assert!(graph.has_edge("my-image", "app-task", EdgeKind::Data));
        assert!(graph.has_edge("web-tg", "app-service", EdgeKind::Data));
        assert!(graph.has_edge("web-sg", "app-service", EdgeKind::Data));
        assert_eq!(graph.edges_of_kind(EdgeKind::Ordering).count(), 1);
    }

    #[tokio::test]
    async fn security_group_rules_are_exact() {
        let (engine, _builder, _deployment) = deploy_default().await;
        let sg = inputs(&engine, "web-sg");

        assert_eq!(sg["vpcId"], json!("vpc-0a1b2c3d"));
        assert_eq!(
            sg["ingress"],
            json!([{ "protocol": "tcp", "fromPort": 80, "toPort": 80, "cidrBlocks": ["0.0.0.0/0"] }])
        );
        assert_eq!(
            sg["egress"],
            json!([{ "protocol": "-1", "fromPort": 0, "toPort": 0, "cidrBlocks": ["0.0.0.0/0"] }])
        );
    }

    #[tokio::test]
    async fn role_attachment_references_role_name() {
        let (engine, _builder, _deployment) = deploy_default().await;
        let role = inputs(&engine, "task-exec-role");
        let policy: Value = serde_json::from_str(role["assumeRolePolicy"].as_str().unwrap()).unwrap();
        assert_eq!(
            policy["Statement"][0]["Principal"]["Service"],
            json!("ecs-tasks.amazonaws.com")
        );

        let attachment = inputs(&engine, "task-exec-policy");
        assert_eq!(attachment["role"], outputs(&engine, "task-exec-role")["name"]);
        assert_eq!(attachment["policyArn"], json!(stack::EXECUTION_POLICY_ARN));
    }

    #[tokio::test]
    async fn listener_forwards_to_target_group() {
        let (engine, _builder, _deployment) = deploy_default().await;
        let listener = inputs(&engine, "web-listener");
        let tg_arn = &outputs(&engine, "web-tg")["arn"];

        assert_eq!(listener["loadBalancerArn"], outputs(&engine, "web-lb")["arn"]);
        assert_eq!(listener["port"], json!(80));
        assert_eq!(
            listener["defaultActions"],
            json!([{ "type": "forward", "targetGroupArn": tg_arn }])
        );

        let tg = inputs(&engine, "web-tg");
        assert_eq!(tg["protocol"], json!("HTTP"));
        assert_eq!(tg["targetType"], json!("ip"));
    }

    #[tokio::test]
    async fn task_definition_is_fargate_compatible() {
        let (engine, _builder, _deployment) = deploy_default().await;
        let task = inputs(&engine, "app-task");

        assert_eq!(task["family"], json!("fargate-task-definition"));
        assert_eq!(task["cpu"], json!("256"));
        assert_eq!(task["memory"], json!("512"));
        assert_eq!(task["networkMode"], json!("awsvpc"));
        assert_eq!(task["requiresCompatibilities"], json!(["FARGATE"]));
        assert_eq!(task["executionRoleArn"], outputs(&engine, "task-exec-role")["arn"]);
    }

    #[tokio::test]
    async fn service_attachment_matches_container_definition() {
        let (engine, _builder, _deployment) = deploy_default().await;

        let task = inputs(&engine, "app-task");
        let definitions: Value =
            serde_json::from_str(task["containerDefinitions"].as_str().unwrap()).unwrap();
        let container = &definitions[0];

        let service = inputs(&engine, "app-service");
        let attachments = service["loadBalancers"].as_array().unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0]["containerName"], container["name"]);
        assert_eq!(
            attachments[0]["containerPort"],
            container["portMappings"][0]["containerPort"]
        );
        assert_eq!(attachments[0]["targetGroupArn"], outputs(&engine, "web-tg")["arn"]);
    }

    #[tokio::test]
    async fn service_runs_in_public_subnets_with_security_group() {
        let (engine, _builder, _deployment) = deploy_default().await;
        let service = inputs(&engine, "app-service");

        assert_eq!(service["launchType"], json!("FARGATE"));
        assert_eq!(service["cluster"], outputs(&engine, "app-cluster")["arn"]);
        assert_eq!(service["taskDefinition"], outputs(&engine, "app-task")["arn"]);
        assert_eq!(
            service["networkConfiguration"],
            json!({
                "assignPublicIp": true,
                "subnets": ["subnet-0a1b2c3d", "subnet-4e5f6a7b"],
                "securityGroups": [outputs(&engine, "web-sg")["id"]],
            })
        );
    }
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn subnets_keep_lookup_order() {
        let engine = Arc::new(MemoryEngine::new().with_subnets(["subnet-a", "subnet-b", "subnet-c"]));
        let builder = Arc::new(RecordingBuilder::new());
        deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap();

        let expected = json!(["subnet-a", "subnet-b", "subnet-c"]);
        assert_eq!(inputs(&engine, "web-lb")["subnets"], expected);
        assert_eq!(
            inputs(&engine, "app-service")["networkConfiguration"]["subnets"],
            expected
        );
    }

    #[tokio::test]
    async fn replica_count_is_an_integer() {
        let engine = Arc::new(MemoryEngine::new());
        let builder = Arc::new(RecordingBuilder::new());
        let config = StackConfig {
            replicas: 3,
            ..StackConfig::default()
        };
        deploy_with(&engine, &builder, &config).await.unwrap();

        assert_eq!(inputs(&engine, "app-service")["desiredCount"], json!(3));
    }

    #[tokio::test]
    async fn default_replica_count_is_five() {
        let (engine, _builder, _deployment) = deploy_default().await;
        assert_eq!(inputs(&engine, "app-service")["desiredCount"], json!(5));
    }

    #[tokio::test]
    async fn custom_port_flows_everywhere() {
        let engine = Arc::new(MemoryEngine::new());
        let builder = Arc::new(RecordingBuilder::new());
        let config = StackConfig {
            port: 8080,
            ..StackConfig::default()
        };
        deploy_with(&engine, &builder, &config).await.unwrap();

        assert_eq!(inputs(&engine, "web-tg")["port"], json!(8080));
        assert_eq!(inputs(&engine, "web-listener")["port"], json!(8080));
        assert_eq!(inputs(&engine, "web-sg")["ingress"][0]["fromPort"], json!(8080));
        assert_eq!(
            inputs(&engine, "app-service")["loadBalancers"][0]["containerPort"],
            json!(8080)
        );
    }

    #[tokio::test]
    async fn decoded_credentials_reach_the_builder() {
        let engine = Arc::new(
            MemoryEngine::new().with_authorization_token(STANDARD.encode("AWS:s3cr3t")),
        );
        let builder = Arc::new(RecordingBuilder::new());
        deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap();

        let requests = builder.requests();
        let request = &requests[0];
        let repository_url = outputs(&engine, "app-repo")["repositoryUrl"]
            .as_str()
            .unwrap()
            .to_string();

        assert_eq!(request.registry.username, "AWS");
        assert_eq!(request.registry.password, "s3cr3t");
        assert_eq!(request.registry.server.as_deref(), Some(repository_url.as_str()));
        assert_eq!(request.image_name.to_string(), format!("{repository_url}:latest"));
        assert!(engine.trace().contains(&TraceEvent::Invoked {
            function: "aws:ecr/getCredentials:getCredentials".to_string(),
        }));
    }

    #[tokio::test]
    async fn container_definition_uses_pushed_reference() {
        let digest = "sha256:4f53cda18c2baa0c0354bb5f9a3ecbe5ed12ab4d8e11ba873c2f11161202b945";
        let engine = Arc::new(MemoryEngine::new());
        let builder = Arc::new(RecordingBuilder::new().with_digest(digest));
        deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap();

        let task = inputs(&engine, "app-task");
        let definitions: Value =
            serde_json::from_str(task["containerDefinitions"].as_str().unwrap()).unwrap();
        let image = definitions[0]["image"].as_str().unwrap();
        assert!(image.ends_with(&format!(":latest@{digest}")), "{image}");
        assert_eq!(definitions[0]["name"], json!("my-app"));
    }

    #[tokio::test]
    async fn malformed_token_fails_with_decode_error() {
        let engine = Arc::new(
            MemoryEngine::new().with_authorization_token(STANDARD.encode("no-separator")),
        );
        let builder = Arc::new(RecordingBuilder::new());
        let err = deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::Decode);
        assert!(builder.requests().is_empty());
        assert!(engine.realized("app-task").is_none());
        assert!(engine.realized("app-service").is_none());
    }

    #[tokio::test]
    async fn credential_lookup_failure_is_reported() {
        let engine = Arc::new(MemoryEngine::new().with_credential_failure("access denied"));
        let builder = Arc::new(RecordingBuilder::new());
        let err = deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeployError::CredentialFetch("rejected by provider: access denied".to_string())
        );
        assert!(builder.requests().is_empty());
    }

    #[tokio::test]
    async fn slow_build_is_abandoned_after_configured_timeout() {
        let engine = Arc::new(MemoryEngine::new());
        let builder = Arc::new(RecordingBuilder::new().with_delay(Duration::from_secs(5)));
        let config = StackConfig {
            build_timeout: Some(Duration::from_millis(50)),
            ..StackConfig::default()
        };

        let err = deploy_with(&engine, &builder, &config).await.unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::ImageBuild);
        assert!(err.to_string().contains("timed out after 50ms"), "{err}");
        assert_eq!(builder.requests().len(), 1);
        assert!(engine.realized("app-task").is_none());
        assert!(engine.realized("app-service").is_none());
    }

    #[tokio::test]
    async fn build_within_timeout_completes() {
        let engine = Arc::new(MemoryEngine::new());
        let builder = Arc::new(RecordingBuilder::new().with_delay(Duration::from_millis(10)));
        let config = StackConfig {
            build_timeout: Some(Duration::from_secs(5)),
            ..StackConfig::default()
        };

        let deployment = deploy_with(&engine, &builder, &config).await.unwrap();
        assert!(deployment.outputs.contains_key(stack::URL_OUTPUT));
    }

    #[tokio::test]
    async fn builder_failure_surfaces_verbatim() {
        let engine = Arc::new(MemoryEngine::new());
        let builder = Arc::new(RecordingBuilder::new().failing("denied: not authorized"));
        let err = deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DeployError::ImageBuild("push failed: denied: not authorized".to_string())
        );
        assert!(engine.realized("app-task").is_none());
    }

    #[tokio::test]
    async fn missing_default_vpc_declares_nothing() {
        let engine = Arc::new(MemoryEngine::new().with_default_vpcs(Vec::<String>::new()));
        let builder = Arc::new(RecordingBuilder::new());
        let err = deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::Lookup);
        assert!(engine.resource_names().is_empty());
    }

    #[tokio::test]
    async fn rejected_resource_is_named_in_the_error() {
        let engine = Arc::new(MemoryEngine::new().with_failure("app-cluster", "limit exceeded"));
        let builder = Arc::new(RecordingBuilder::new());
        let err = deploy_with(&engine, &builder, &StackConfig::default())
            .await
            .unwrap_err();

        assert_eq!(err.resource(), Some("app-cluster"));
        assert!(err.to_string().contains("limit exceeded"));
        assert!(!engine.trace().iter().any(|event| matches!(
            event,
            TraceEvent::Realized { ty, .. } if *ty == ResourceType::SERVICE
        )));
    }
}
