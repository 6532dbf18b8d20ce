// ABOUTME: Resource declaration, deferred outputs, and the dependency graph.
// ABOUTME: This is the orchestration core every stack component builds on.

mod context;
mod error;
mod graph;
mod input;
mod output;

pub use context::{Context, Resource, ResourceOptions, StackOutputs};
pub use error::{DeployError, DeployErrorKind};
pub use graph::{Edge, EdgeKind, GraphError, Node, ResourceGraph};
pub use input::{Input, Inputs};
pub use output::{Output, OutputValue};
