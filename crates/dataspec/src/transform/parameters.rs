//! Named node arguments bound to a transform application.

use std::collections::BTreeMap;

use crate::node::{Node, NodeId, NodeKind};

/// Named parameters of a transform application, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    nodes: BTreeMap<String, Node>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `node` to `name`, replacing any previous binding.
    pub fn with(mut self, name: impl Into<String>, node: &Node) -> Self {
        self.insert(name, node.clone());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, node: Node) {
        self.nodes.insert(name.into(), node);
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.nodes.iter().map(|(name, node)| (name.as_str(), node))
    }

    /// Names with the kinds of their bound nodes.
    pub fn kinds(&self) -> impl Iterator<Item = (&str, NodeKind)> {
        self.iter().map(|(name, node)| (name, node.kind()))
    }

    /// Names with the identities of their bound nodes.
    pub fn ids(&self) -> BTreeMap<String, NodeId> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.uuid().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
