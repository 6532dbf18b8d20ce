// ABOUTME: Deferred values produced by realizing resources.
// ABOUTME: Outputs compose with pure combinators and are resolved only by the deployment driver.

use std::collections::BTreeSet;
use std::future::Future;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::error::DeployError;
use crate::types::ResourceName;

/// Bounds every value carried by an [`Output`] must satisfy.
pub trait OutputValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> OutputValue for T {}

pub(crate) type SharedResult<T> = Shared<BoxFuture<'static, Result<T, DeployError>>>;

/// A value that is not known until one or more resources are realized.
///
/// An output is single-producer and multi-consumer: cloning it shares the
/// underlying computation, so a transformation chained onto it runs at most
/// once no matter how many resources consume the result. Outputs remember
/// which resources they were derived from; passing one as an input records
/// a data edge to each of them.
///
/// Orchestration code only composes outputs. Awaiting them is reserved for
/// the deployment driver.
#[must_use = "outputs do nothing unless consumed by a resource or export"]
pub struct Output<T> {
    future: SharedResult<T>,
    dependencies: BTreeSet<ResourceName>,
}

impl<T> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            future: self.future.clone(),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("dependencies", &self.dependencies)
            .field("resolved", &self.future.peek().is_some())
            .finish()
    }
}

impl<T: OutputValue> Output<T> {
    /// An output whose value is already known.
    pub fn known(value: T) -> Self {
        Self {
            future: futures::future::ready(Ok(value)).boxed().shared(),
            dependencies: BTreeSet::new(),
        }
    }

    pub(crate) fn from_future(
        future: BoxFuture<'static, Result<T, DeployError>>,
        dependencies: BTreeSet<ResourceName>,
    ) -> Self {
        Self {
            future: future.shared(),
            dependencies,
        }
    }

    /// Derive a new output with a pure function.
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: OutputValue,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let future = self.future.clone().map(|result| result.map(f)).boxed();
        Output::from_future(future, self.dependencies.clone())
    }

    /// Derive a new output with a function that may reject the value.
    pub fn try_map<U, F>(&self, f: F) -> Output<U>
    where
        U: OutputValue,
        F: FnOnce(T) -> Result<U, DeployError> + Send + 'static,
    {
        let future = self.future.clone().map(|result| result.and_then(f)).boxed();
        Output::from_future(future, self.dependencies.clone())
    }

    /// Derive a new output through an asynchronous call.
    ///
    /// The call is made once the value resolves, and at most once.
    pub fn then<U, F, Fut>(&self, f: F) -> Output<U>
    where
        U: OutputValue,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, DeployError>> + Send + 'static,
    {
        let source = self.future.clone();
        let future = async move {
            let value = source.await?;
            f(value).await
        }
        .boxed();
        Output::from_future(future, self.dependencies.clone())
    }

    /// Combine two outputs into one that resolves when both have.
    pub fn zip<U: OutputValue>(&self, other: &Output<U>) -> Output<(T, U)> {
        let future = futures::future::try_join(self.future.clone(), other.future.clone()).boxed();
        let dependencies = self
            .dependencies
            .union(&other.dependencies)
            .cloned()
            .collect();
        Output::from_future(future, dependencies)
    }

    /// Collect outputs into one, preserving their order.
    pub fn all(outputs: impl IntoIterator<Item = Output<T>>) -> Output<Vec<T>> {
        let mut dependencies = BTreeSet::new();
        let mut futures = Vec::new();
        for output in outputs {
            dependencies.extend(output.dependencies);
            futures.push(output.future);
        }
        let future = futures::future::try_join_all(futures).boxed();
        Output::from_future(future, dependencies)
    }

    /// Resources this output was derived from.
    pub fn dependencies(&self) -> &BTreeSet<ResourceName> {
        &self.dependencies
    }

    /// The value if it has already resolved.
    pub fn peek(&self) -> Option<&Result<T, DeployError>> {
        self.future.peek()
    }

    pub(crate) async fn resolve(&self) -> Result<T, DeployError> {
        self.future.clone().await
    }
}
