// ABOUTME: Declaration context shared by every resource builder in one deployment.
// ABOUTME: Registers resources eagerly, records the graph, and drives realization to completion.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::DeployError;
use super::graph::{EdgeKind, GraphError, ResourceGraph};
use super::input::{Input, Inputs};
use super::output::{Output, OutputValue, SharedResult};
use crate::engine::{Engine, EngineError, PropertyMap, RegisterRequest, ResourceType};
use crate::types::ResourceName;

/// A declared resource.
///
/// Cloning is cheap; every clone observes the same realization.
#[derive(Clone)]
pub struct Resource {
    name: ResourceName,
    ty: ResourceType,
    state: SharedResult<PropertyMap>,
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish()
    }
}

impl Resource {
    pub fn name(&self) -> &ResourceName {
        &self.name
    }

    pub fn resource_type(&self) -> ResourceType {
        self.ty
    }

    /// One output property, decoded once the resource is realized.
    pub fn output<T>(&self, key: &'static str) -> Output<T>
    where
        T: DeserializeOwned + OutputValue,
    {
        let name = self.name.clone();
        let future = self
            .state
            .clone()
            .map(move |result| {
                let mut outputs = result?;
                let value = outputs.remove(key).ok_or_else(|| {
                    DeployError::declaration(&name, format!("engine returned no '{key}' output"))
                })?;
                serde_json::from_value(value).map_err(|e| {
                    DeployError::declaration(&name, format!("malformed '{key}' output: {e}"))
                })
            })
            .boxed();
        Output::from_future(future, [self.name.clone()].into())
    }

    /// The provider-assigned identifier.
    pub fn id(&self) -> Output<String> {
        self.output("id")
    }

    async fn realized(&self) -> Result<(), DeployError> {
        self.state.clone().await.map(|_| ())
    }
}

/// Options that are not inputs.
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    depends_on: Vec<Resource>,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not realize the new resource before `resource`, even though no
    /// input refers to it.
    pub fn depends_on(mut self, resource: &Resource) -> Self {
        self.depends_on.push(resource.clone());
        self
    }
}

/// Named values published when the deployment completes.
pub type StackOutputs = BTreeMap<String, Value>;

struct Pending {
    name: ResourceName,
    state: SharedResult<PropertyMap>,
    task: JoinHandle<()>,
}

// A resource must never be realized once its deployment has been given up.
impl Drop for Pending {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Collects resource declarations for one deployment.
///
/// Declaring never blocks: each resource is spawned onto the tokio runtime,
/// where it waits for its inputs and explicit dependencies before being
/// realized. Must be used from within a tokio runtime.
///
/// Dropping the context without [`Context::finish`] aborts every resource
/// still waiting or in flight.
pub struct Context {
    engine: Arc<dyn Engine>,
    graph: Mutex<ResourceGraph>,
    pending: Mutex<Vec<Pending>>,
    exports: Mutex<BTreeMap<String, Input>>,
}

impl Context {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            graph: Mutex::new(ResourceGraph::new()),
            pending: Mutex::new(Vec::new()),
            exports: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn engine(&self) -> Arc<dyn Engine> {
        Arc::clone(&self.engine)
    }

    /// Snapshot of the graph declared so far.
    pub fn graph(&self) -> ResourceGraph {
        self.graph.lock().clone()
    }

    /// Call a provider lookup directly.
    pub async fn invoke(
        &self,
        function: &str,
        args: PropertyMap,
    ) -> Result<PropertyMap, EngineError> {
        debug!(function, "invoking provider function");
        self.engine.invoke(function, args).await
    }

    /// Declare a resource realized by the engine.
    pub fn register(
        &self,
        name: &str,
        ty: ResourceType,
        inputs: Inputs,
        options: ResourceOptions,
    ) -> Result<Resource, DeployError> {
        let engine = self.engine();
        self.register_with(name, ty, inputs, options, move |request| async move {
            let name = request.name.clone();
            engine
                .register(request)
                .await
                .map_err(|e| DeployError::declaration(name, e.to_string()))
        })
    }

    /// Declare a resource realized by something other than the engine, such
    /// as the image build tool. Ordering and graph recording are the same as
    /// for [`Context::register`].
    pub fn register_with<F, Fut>(
        &self,
        name: &str,
        ty: ResourceType,
        inputs: Inputs,
        options: ResourceOptions,
        realize: F,
    ) -> Result<Resource, DeployError>
    where
        F: FnOnce(RegisterRequest) -> Fut + Send + 'static,
        Fut: Future<Output = Result<PropertyMap, DeployError>> + Send + 'static,
    {
        let name = ResourceName::new(name).map_err(|e| DeployError::declaration(name, e.to_string()))?;
        let data_dependencies = inputs.dependencies();
        let ordered_after = options.depends_on;

        {
            let mut graph = self.graph.lock();
            let record = |graph: &mut ResourceGraph| -> Result<(), GraphError> {
                graph.add_node(name.clone(), ty)?;
                for dep in &data_dependencies {
                    graph.add_edge(dep.clone(), name.clone(), EdgeKind::Data)?;
                }
                for dep in &ordered_after {
                    graph.add_edge(dep.name.clone(), name.clone(), EdgeKind::Ordering)?;
                }
                Ok(())
            };
            record(&mut graph).map_err(|e| DeployError::declaration(&name, e.to_string()))?;
        }

        let mut dependencies: Vec<ResourceName> = data_dependencies.into_iter().collect();
        for dep in &ordered_after {
            if !dependencies.contains(&dep.name) {
                dependencies.push(dep.name.clone());
            }
        }

        debug!(resource = %name, %ty, ?dependencies, "declared resource");

        let owner = name.clone();
        let state = async move {
            let properties = inputs.resolve(owner.as_str()).await?;
            for dep in &ordered_after {
                dep.realized().await?;
            }

            info!(resource = %owner, %ty, "realizing resource");
            let request = RegisterRequest {
                name: owner.clone(),
                ty,
                inputs: properties,
                dependencies,
            };
            let outputs = realize(request).await?;
            debug!(resource = %owner, "resource realized");
            Ok(outputs)
        }
        .boxed()
        .shared();

        let task = tokio::spawn(state.clone().map(|_| ()));
        self.pending.lock().push(Pending {
            name: name.clone(),
            state: state.clone(),
            task,
        });

        Ok(Resource { name, ty, state })
    }

    /// Publish a value as a named deployment output.
    pub fn export(&self, key: impl Into<String>, value: impl Into<Input>) {
        self.exports.lock().insert(key.into(), value.into());
    }

    /// Wait for every declared resource, then resolve the exports.
    ///
    /// The first failure aborts whatever is still pending and is returned
    /// unchanged. Nothing already realized is undone.
    pub async fn finish(self) -> Result<StackOutputs, DeployError> {
        let pending = std::mem::take(&mut *self.pending.lock());

        let mut in_flight: FuturesUnordered<_> = pending
            .iter()
            .map(|p| {
                let name = p.name.clone();
                p.state.clone().map(move |result| (name, result))
            })
            .collect();

        while let Some((name, result)) = in_flight.next().await {
            if let Err(e) = result {
                warn!(resource = %name, error = %e, "deployment failed, aborting pending resources");
                drop(pending);
                return Err(e);
            }
        }

        let exports = std::mem::take(&mut *self.exports.lock());
        let mut outputs = StackOutputs::new();
        for (key, value) in exports {
            let resolved = value.resolve_export(&key).await?;
            outputs.insert(key, resolved);
        }

        info!(resources = pending.len(), outputs = outputs.len(), "deployment complete");
        Ok(outputs)
    }
}
