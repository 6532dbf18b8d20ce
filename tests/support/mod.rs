// ABOUTME: Shared helpers for integration tests.
// ABOUTME: Provides a recording image builder and stack deployment shortcuts.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use skiff::config::StackConfig;
use skiff::engine::MemoryEngine;
use skiff::image::{BuildRequest, ImageBuildError, ImageBuilder};
use skiff::resource::DeployError;
use skiff::stack::{self, Deployment};
use skiff::types::ImageRef;
use std::sync::Arc;
use std::time::Duration;

/// Image builder that records every request and never touches Docker.
#[derive(Default)]
pub struct RecordingBuilder {
    requests: Mutex<Vec<BuildRequest>>,
    digest: Option<String>,
    failure: Option<String>,
    delay: Option<Duration>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report pushes as pinned to `digest`.
    pub fn with_digest(mut self, digest: &str) -> Self {
        self.digest = Some(digest.to_string());
        self
    }

    /// Fail every push with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Take `delay` to finish each push.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ImageBuilder for RecordingBuilder {
    async fn build_and_push(&self, request: &BuildRequest) -> Result<ImageRef, ImageBuildError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref message) = self.failure {
            return Err(ImageBuildError::PushFailed(message.clone()));
        }
        Ok(match self.digest {
            Some(ref digest) => request.image_name.clone().with_digest(digest.clone()),
            None => request.image_name.clone(),
        })
    }
}

/// Deploy the stack with `config` against `engine` and `builder`.
pub async fn deploy_with(
    engine: &Arc<MemoryEngine>,
    builder: &Arc<RecordingBuilder>,
    config: &StackConfig,
) -> Result<Deployment, DeployError> {
    stack::deploy(engine.clone(), builder.clone(), config).await
}

/// Deploy the default stack against a fresh engine.
pub async fn deploy_default() -> (Arc<MemoryEngine>, Arc<RecordingBuilder>, Deployment) {
    let engine = Arc::new(MemoryEngine::new());
    let builder = Arc::new(RecordingBuilder::new());
    let deployment = deploy_with(&engine, &builder, &StackConfig::default())
        .await
        .unwrap();
    (engine, builder, deployment)
}
