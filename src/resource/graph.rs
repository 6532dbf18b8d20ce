// ABOUTME: Dependency graph recorded while resources are declared.
// ABOUTME: Distinguishes data edges from explicit ordering edges.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::engine::ResourceType;
use crate::types::ResourceName;

/// Why one resource must be realized after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    /// The dependent consumes an output of the dependency.
    Data,
    /// Declared ordering with no data flowing between the two.
    Ordering,
}

/// `to` must not be realized before `from`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub from: ResourceName,
    pub to: ResourceName,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: ResourceName,
    pub ty: ResourceType,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("resource '{0}' is already declared")]
    Duplicate(ResourceName),

    #[error("resource '{0}' is not declared")]
    Unknown(ResourceName),

    #[error("dependency cycle through '{0}'")]
    Cycle(ResourceName),
}

/// Resources in declaration order plus the edges between them.
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: ResourceName, ty: ResourceType) -> Result<(), GraphError> {
        if self.contains(&name) {
            return Err(GraphError::Duplicate(name));
        }
        self.nodes.push(Node { name, ty });
        Ok(())
    }

    /// Record that `to` depends on `from`. Both must already be declared.
    pub fn add_edge(
        &mut self,
        from: ResourceName,
        to: ResourceName,
        kind: EdgeKind,
    ) -> Result<(), GraphError> {
        for name in [&from, &to] {
            if !self.contains(name) {
                return Err(GraphError::Unknown(name.clone()));
            }
        }
        let edge = Edge { from, to, kind };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        Ok(())
    }

    pub fn contains(&self, name: &ResourceName) -> bool {
        self.nodes.iter().any(|node| &node.name == name)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn has_edge(&self, from: &str, to: &str, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|e| e.from.as_str() == from && e.to.as_str() == to && e.kind == kind)
    }

    /// Edges pointing at `name`, i.e. what it waits for.
    pub fn dependencies_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.to.as_str() == name)
    }

    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    /// A realization order honoring every edge. Ties keep declaration order.
    pub fn topological_order(&self) -> Result<Vec<&ResourceName>, GraphError> {
        let mut waiting: BTreeMap<&ResourceName, BTreeSet<&ResourceName>> = self
            .nodes
            .iter()
            .map(|node| (&node.name, BTreeSet::new()))
            .collect();
        for edge in &self.edges {
            if let Some(deps) = waiting.get_mut(&edge.to) {
                deps.insert(&edge.from);
            }
        }

        let mut order = Vec::with_capacity(self.nodes.len());
        while order.len() < self.nodes.len() {
            let next = self
                .nodes
                .iter()
                .map(|node| &node.name)
                .find(|name| waiting.get(name).is_some_and(|deps| deps.is_empty()));

            let Some(next) = next else {
                // Everything left waits on something else that is left.
                let stuck = waiting.keys().next().map(|name| (*name).clone());
                return Err(GraphError::Cycle(stuck.unwrap_or_else(|| {
                    self.nodes[0].name.clone()
                })));
            };

            waiting.remove(next);
            for deps in waiting.values_mut() {
                deps.remove(next);
            }
            order.push(next);
        }

        Ok(order)
    }

    /// Human-readable listing in realization order.
    pub fn render(&self) -> Result<String, GraphError> {
        let mut out = String::new();
        for name in self.topological_order()? {
            let ty = self
                .nodes
                .iter()
                .find(|node| &node.name == name)
                .map(|node| node.ty.as_str())
                .unwrap_or_default();
            let _ = writeln!(out, "{name} ({ty})");
            for edge in self.dependencies_of(name.as_str()) {
                let marker = match edge.kind {
                    EdgeKind::Data => "<-",
                    EdgeKind::Ordering => "<= after",
                };
                let _ = writeln!(out, "    {marker} {}", edge.from);
            }
        }
        Ok(out)
    }
}
