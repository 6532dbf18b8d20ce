// ABOUTME: Resource input arguments mixing literal values and deferred outputs.
// ABOUTME: Inputs resolve to a property map once every referenced output has resolved.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use super::error::DeployError;
use super::output::{Output, OutputValue};
use crate::engine::PropertyMap;
use crate::types::ResourceName;

/// A single input argument.
#[derive(Debug, Clone)]
pub enum Input {
    /// Known at declaration time.
    Literal(Value),
    /// Known once the producing resources are realized. A serialization
    /// failure is carried as `Err` and reported against the consuming resource.
    Deferred(Output<Result<Value, String>>),
}

impl Input {
    pub fn dependencies(&self) -> BTreeSet<ResourceName> {
        match self {
            Input::Literal(_) => BTreeSet::new(),
            Input::Deferred(output) => output.dependencies().clone(),
        }
    }

    pub(crate) async fn resolve(&self, owner: &str) -> Result<Value, DeployError> {
        self.resolve_or(|e| DeployError::declaration(owner, format!("invalid input: {e}")))
            .await
    }

    /// Resolve as a deployment output published under `key`.
    pub(crate) async fn resolve_export(&self, key: &str) -> Result<Value, DeployError> {
        self.resolve_or(|e| DeployError::export(key, e)).await
    }

    async fn resolve_or(
        &self,
        invalid: impl FnOnce(String) -> DeployError,
    ) -> Result<Value, DeployError> {
        match self {
            Input::Literal(value) => Ok(value.clone()),
            Input::Deferred(output) => output.resolve().await?.map_err(invalid),
        }
    }
}

impl<T: Serialize + OutputValue> From<Output<T>> for Input {
    fn from(output: Output<T>) -> Self {
        Input::Deferred(output.map(|value| serde_json::to_value(value).map_err(|e| e.to_string())))
    }
}

impl<T: Serialize + OutputValue> From<&Output<T>> for Input {
    fn from(output: &Output<T>) -> Self {
        Input::from(output.clone())
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Input::Literal(value)
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<bool> for Input {
    fn from(value: bool) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<u16> for Input {
    fn from(value: u16) -> Self {
        Input::Literal(Value::from(value))
    }
}

impl From<u32> for Input {
    fn from(value: u32) -> Self {
        Input::Literal(Value::from(value))
    }
}

/// Named input arguments for one resource declaration.
#[derive(Debug, Clone, Default)]
pub struct Inputs {
    entries: BTreeMap<String, Input>,
}

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an argument, replacing any previous value under the same key.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Input>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Input> {
        self.entries.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every resource whose outputs these inputs reference.
    pub fn dependencies(&self) -> BTreeSet<ResourceName> {
        self.entries
            .values()
            .flat_map(|input| input.dependencies())
            .collect()
    }

    pub(crate) async fn resolve(&self, owner: &str) -> Result<PropertyMap, DeployError> {
        let values = futures::future::try_join_all(
            self.entries.values().map(|input| input.resolve(owner)),
        )
        .await?;

        Ok(self.entries.keys().cloned().zip(values).collect())
    }
}
