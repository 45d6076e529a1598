/// Commit protocol between the front-end and the core.
///
/// The front-end never exposes a live tree: after each reconciliation it
/// sends one `Commit` listing created, updated and removed nodes.

use super::node::{NodeDesc, NodeId};

/// One batch of tree changes
#[derive(Debug, Clone, Default)]
pub struct Commit {
    /// New nodes, may reference each other in any order
    pub created: Vec<NodeDesc>,
    /// Full replacement descriptions of existing nodes
    pub updated: Vec<NodeDesc>,
    /// Removed nodes, their whole sub-tree goes with them
    pub removed: Vec<NodeId>,
}

impl Commit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(mut self, node: impl Into<NodeDesc>) -> Self {
        self.created.push(node.into());
        self
    }

    pub fn update(mut self, node: impl Into<NodeDesc>) -> Self {
        self.updated.push(node.into());
        self
    }

    pub fn remove(mut self, id: NodeId) -> Self {
        self.removed.push(id);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}
