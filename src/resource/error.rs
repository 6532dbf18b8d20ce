// ABOUTME: Error types for declaring and realizing resources.
// ABOUTME: Every variant is fatal to the deployment and is surfaced verbatim.

use std::fmt;

/// Errors that abort a deployment.
///
/// `Clone` because a failed output is shared by every resource that
/// consumes it; each consumer observes the same error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    /// The default network is missing, ambiguous, or has no subnets.
    #[error("network lookup failed: {0}")]
    Lookup(String),

    /// Registry credentials could not be fetched.
    #[error("failed to fetch registry credentials: {0}")]
    CredentialFetch(String),

    /// The registry authorization token was malformed.
    #[error("failed to decode registry credentials: {0}")]
    Decode(String),

    /// The build tool failed to build or push the image.
    #[error("image build failed: {0}")]
    ImageBuild(String),

    /// The engine rejected or failed to realize a declared resource.
    #[error("resource '{name}' failed: {message}")]
    ResourceDeclaration { name: String, message: String },

    /// A deployment output could not be encoded.
    #[error("export '{key}' failed: {message}")]
    Export { key: String, message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    Lookup,
    CredentialFetch,
    Decode,
    ImageBuild,
    ResourceDeclaration,
    Export,
}

impl DeployError {
    pub fn declaration(name: impl fmt::Display, message: impl Into<String>) -> Self {
        DeployError::ResourceDeclaration {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub fn export(key: impl fmt::Display, message: impl Into<String>) -> Self {
        DeployError::Export {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Lookup(_) => DeployErrorKind::Lookup,
            DeployError::CredentialFetch(_) => DeployErrorKind::CredentialFetch,
            DeployError::Decode(_) => DeployErrorKind::Decode,
            DeployError::ImageBuild(_) => DeployErrorKind::ImageBuild,
            DeployError::ResourceDeclaration { .. } => DeployErrorKind::ResourceDeclaration,
            DeployError::Export { .. } => DeployErrorKind::Export,
        }
    }

    /// Name of the failing resource, when the failure belongs to one.
    pub fn resource(&self) -> Option<&str> {
        match self {
            DeployError::ResourceDeclaration { name, .. } => Some(name),
            _ => None,
        }
    }
}
