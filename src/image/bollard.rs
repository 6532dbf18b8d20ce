// ABOUTME: Bollard-based image builder talking to the local Docker daemon.
// ABOUTME: Packs the build context, builds, tags with the registry URL, and pushes.

use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::query_parameters::{BuildImageOptions, PushImageOptions};
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{Either, Full};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{BuildRequest, ImageBuildError, ImageBuilder};
use crate::types::ImageRef;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_build_error(e: bollard::errors::Error, image_name: &str) -> ImageBuildError {
    ImageBuildError::BuildFailed(format!("{}: {}", image_name, e))
}

fn map_push_error(e: bollard::errors::Error, repository: &str) -> ImageBuildError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 401 || *status_code == 403 => {
            ImageBuildError::AuthenticationFailed(format!("{}: {}", repository, message))
        }
        _ => ImageBuildError::PushFailed(format!("{}: {}", repository, e)),
    }
}

/// Extract `sha256:...` from a push status line such as
/// `latest: digest: sha256:abc size: 528`.
fn parse_digest(status: &str) -> Option<String> {
    let (_, rest) = status.split_once("digest: ")?;
    let digest = rest.split_whitespace().next()?;
    digest.starts_with("sha256:").then(|| digest.to_string())
}

/// Pack a build context directory into an uncompressed tar archive.
pub fn pack_context(dir: &Path) -> Result<Vec<u8>, ImageBuildError> {
    let context_error = |message: String| ImageBuildError::Context {
        path: dir.to_path_buf(),
        message,
    };

    if !dir.is_dir() {
        return Err(context_error("not a directory".to_string()));
    }

    let mut archive = tar::Builder::new(Vec::new());
    archive.follow_symlinks(false);
    archive
        .append_dir_all(".", dir)
        .map_err(|e| context_error(e.to_string()))?;
    archive.into_inner().map_err(|e| context_error(e.to_string()))
}

// =============================================================================
// BollardImageBuilder
// =============================================================================

/// Image builder using the Docker Engine API through bollard.
pub struct BollardImageBuilder {
    client: Docker,
}

impl BollardImageBuilder {
    pub fn new(client: Docker) -> Self {
        Self { client }
    }

    /// Connect to the local daemon using `DOCKER_HOST` or the default socket.
    pub fn connect_local() -> Result<Self, ImageBuildError> {
        let client = Docker::connect_with_local_defaults()
            .map_err(|e| ImageBuildError::Runtime(e.to_string()))?;
        Ok(Self::new(client))
    }

    async fn build(&self, request: &BuildRequest) -> Result<(), ImageBuildError> {
        let dir: PathBuf = request.context.clone();
        let archive = tokio::task::spawn_blocking(move || pack_context(&dir))
            .await
            .map_err(|e| ImageBuildError::Runtime(e.to_string()))??;

        let image_name = request.image_name.to_string();
        let options = BuildImageOptions {
            dockerfile: "Dockerfile".to_string(),
            t: Some(image_name.clone()),
            ..Default::default()
        };

        info!(image = %image_name, context = %request.context.display(), "building image");

        let body = Either::Left(Full::new(Bytes::from(archive)));
        let mut stream = self.client.build_image(options, None, Some(body));
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| map_build_error(e, &image_name))?;
            if let Some(detail) = info.error_detail {
                return Err(ImageBuildError::BuildFailed(format!(
                    "{}: {}",
                    image_name,
                    detail.message.unwrap_or_default()
                )));
            }
            match info.stream.as_deref().map(str::trim_end) {
                Some(line) if !line.is_empty() => debug!(image = %image_name, "{line}"),
                _ => {}
            }
        }

        Ok(())
    }

    async fn push(&self, request: &BuildRequest) -> Result<ImageRef, ImageBuildError> {
        let repository = request.image_name.repository();
        let options = PushImageOptions {
            tag: request.image_name.tag().map(str::to_string),
            ..Default::default()
        };

        let credentials = DockerCredentials {
            username: Some(request.registry.username.clone()),
            password: Some(request.registry.password.clone()),
            serveraddress: request.registry.server.clone(),
            ..Default::default()
        };

        info!(repository = %repository, "pushing image");

        // Push returns a stream of progress updates - consume it
        let mut digest = None;
        let mut stream = self
            .client
            .push_image(&repository, Some(options), Some(credentials));
        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| map_push_error(e, &repository))?;
            if let Some(found) = info.status.as_deref().and_then(parse_digest) {
                digest = Some(found);
            }
        }

        Ok(match digest {
            Some(digest) => request.image_name.clone().with_digest(digest),
            None => request.image_name.clone(),
        })
    }
}

#[async_trait]
impl ImageBuilder for BollardImageBuilder {
    async fn build_and_push(&self, request: &BuildRequest) -> Result<ImageRef, ImageBuildError> {
        self.build(request).await?;
        self.push(request).await
    }
}
