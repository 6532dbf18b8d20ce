// ABOUTME: Image builder that skips the build and push.
// ABOUTME: Used for previews where no container runtime or registry is available.

use async_trait::async_trait;

use super::{BuildRequest, ImageBuildError, ImageBuilder};
use crate::types::ImageRef;

/// Reports the requested reference as pushed without touching Docker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunBuilder;

#[async_trait]
impl ImageBuilder for DryRunBuilder {
    async fn build_and_push(&self, request: &BuildRequest) -> Result<ImageRef, ImageBuildError> {
        tracing::debug!(
            image = %request.image_name,
            context = %request.context.display(),
            "dry run, skipping image build"
        );
        Ok(request.image_name.clone())
    }
}
