// ABOUTME: Container image build-and-push interface and registry credentials.
// ABOUTME: The build tool is external; implementations wrap Docker or skip the build entirely.

mod bollard;
mod credentials;
mod dry_run;

pub use self::bollard::{BollardImageBuilder, pack_context};
pub use credentials::decode_authorization_token;
pub use dry_run::DryRunBuilder;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::resource::DeployError;
use crate::types::ImageRef;

/// Registry authentication credentials.
///
/// Lives only as long as one push. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAuth {
    /// Username.
    pub username: String,
    /// Password or token.
    pub password: String,
    /// Registry server (e.g., the repository URL).
    #[serde(default)]
    pub server: Option<String>,
}

impl RegistryAuth {
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("server", &self.server)
            .finish()
    }
}

/// Everything needed to build one image and push it.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Directory sent to the builder as the build context.
    pub context: PathBuf,
    /// Target reference, including registry and tag.
    pub image_name: ImageRef,
    pub registry: RegistryAuth,
}

/// Builds an image from a context directory and pushes it to a registry.
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Returns the reference the pushed image resolved to.
    async fn build_and_push(&self, request: &BuildRequest) -> Result<ImageRef, ImageBuildError>;
}

/// Errors from building or pushing an image.
#[derive(Debug, thiserror::Error)]
pub enum ImageBuildError {
    #[error("cannot read build context {path}: {message}")]
    Context { path: PathBuf, message: String },

    #[error("build failed: {0}")]
    BuildFailed(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("push failed: {0}")]
    PushFailed(String),

    #[error("build and push timed out after {0:?}")]
    Timeout(Duration),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl From<ImageBuildError> for DeployError {
    fn from(err: ImageBuildError) -> Self {
        DeployError::ImageBuild(err.to_string())
    }
}
