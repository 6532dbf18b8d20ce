// ABOUTME: Application-wide error types for skiff.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

use crate::resource::{DeployError, GraphError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("deployment failed: {0}")]
    Deploy(#[from] DeployError),

    #[error("invalid resource graph: {0}")]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, Error>;
