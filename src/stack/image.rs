// ABOUTME: Registry repository, credential fetch, image build-and-push, and container definition.
// ABOUTME: Credentials are fetched and decoded only once the repository's registry ID is known.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use super::container_def::ContainerDefinition;
use crate::config::StackConfig;
use crate::engine::{Engine, PropertyMap, RegisterRequest, ResourceType, functions};
use crate::image::{
    BuildRequest, ImageBuildError, ImageBuilder, RegistryAuth, decode_authorization_token,
};
use crate::resource::{Context, DeployError, Inputs, Output, Resource, ResourceOptions};
use crate::types::{ImageRef, RegistryId};

pub const REPOSITORY_NAME: &str = "app-repo";
pub const IMAGE_NAME: &str = "my-image";

#[derive(Debug, Clone)]
pub struct ImagePipeline {
    repository: Resource,
    image: Resource,
    container: Output<ContainerDefinition>,
    container_definitions: Output<String>,
}

impl ImagePipeline {
    /// The container definition every consumer shares.
    pub fn container(&self) -> Output<ContainerDefinition> {
        self.container.clone()
    }

    /// The container definition rendered for the task definition.
    pub fn container_definitions(&self) -> Output<String> {
        self.container_definitions.clone()
    }

    pub fn repository(&self) -> &Resource {
        &self.repository
    }

    pub fn image(&self) -> &Resource {
        &self.image
    }
}

/// Fetch the registry authorization token through the provider lookup.
async fn fetch_authorization_token(
    engine: Arc<dyn Engine>,
    registry_id: RegistryId,
) -> Result<String, DeployError> {
    let mut args = PropertyMap::new();
    args.insert("registryId".to_string(), json!(registry_id.as_str()));
    let mut result = engine
        .invoke(functions::GET_CREDENTIALS, args)
        .await
        .map_err(|e| DeployError::CredentialFetch(e.to_string()))?;

    match result.remove("authorizationToken") {
        Some(Value::String(token)) => Ok(token),
        _ => Err(DeployError::CredentialFetch(format!(
            "no authorization token returned for registry {registry_id}"
        ))),
    }
}

pub fn image_pipeline(
    ctx: &Context,
    config: &StackConfig,
    builder: Arc<dyn ImageBuilder>,
) -> Result<ImagePipeline, DeployError> {
    let repository = ctx.register(
        REPOSITORY_NAME,
        ResourceType::REPOSITORY,
        Inputs::new(),
        ResourceOptions::new(),
    )?;
    let repository_url: Output<String> = repository.output("repositoryUrl");

    let engine = ctx.engine();
    let token = repository
        .output::<RegistryId>("registryId")
        .then(move |registry_id| fetch_authorization_token(engine, registry_id));

    let credentials = token.zip(&repository_url).try_map(|(token, url)| {
        decode_authorization_token(&token).map(|auth| auth.with_server(url))
    });

    let tag = config.image_tag.clone();
    let image_name = repository_url.map(move |url| format!("{url}:{tag}"));

    let inputs = Inputs::new()
        .set("imageName", image_name)
        .set(
            "build",
            json!({ "context": config.build_context.to_string_lossy() }),
        )
        .set("registry", credentials);

    let timeout = config.build_timeout;
    let image = ctx.register_with(
        IMAGE_NAME,
        ResourceType::IMAGE,
        inputs,
        ResourceOptions::new(),
        move |request| build_and_push(builder, timeout, request),
    )?;

    let container_name = config.container_name.clone();
    let port = config.port;
    let container = image
        .output::<String>("imageName")
        .map(move |reference| ContainerDefinition::new(&container_name, reference, port));

    let container_definitions = container.try_map(|definition| {
        definition
            .render()
            .map_err(|e| DeployError::declaration(IMAGE_NAME, e.to_string()))
    });

    Ok(ImagePipeline {
        repository,
        image,
        container,
        container_definitions,
    })
}

/// Realize the image resource with the build tool instead of the engine.
///
/// With a `timeout`, the whole build and push is abandoned once it elapses.
async fn build_and_push(
    builder: Arc<dyn ImageBuilder>,
    timeout: Option<Duration>,
    mut request: RegisterRequest,
) -> Result<PropertyMap, DeployError> {
    let build_request = build_request(&mut request)?;
    debug!(
        resource = %request.name,
        image = %build_request.image_name,
        "handing image to build tool"
    );

    let work = builder.build_and_push(&build_request);
    let pushed = match timeout {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| ImageBuildError::Timeout(limit))??,
        None => work.await?,
    };

    let mut outputs = PropertyMap::new();
    outputs.insert("imageName".to_string(), json!(pushed.to_string()));
    Ok(outputs)
}

fn build_request(request: &mut RegisterRequest) -> Result<BuildRequest, DeployError> {
    let name = request.name.clone();
    let invalid = |message: String| DeployError::declaration(&name, message);

    let image_name = request
        .inputs
        .get("imageName")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing imageName input".to_string()))?;
    let image_name = ImageRef::parse(image_name).map_err(|e| invalid(e.to_string()))?;

    let context = request
        .inputs
        .get("build")
        .and_then(|build| build.get("context"))
        .and_then(Value::as_str)
        .map(PathBuf::from)
        .ok_or_else(|| invalid("missing build.context input".to_string()))?;

    // Taken out of the inputs so the password goes no further than the builder.
    let registry = request
        .inputs
        .remove("registry")
        .ok_or_else(|| invalid("missing registry input".to_string()))?;
    let registry: RegistryAuth = serde_json::from_value(registry)
        .map_err(|_| invalid("invalid registry input".to_string()))?;

    Ok(BuildRequest {
        context,
        image_name,
        registry,
    })
}
