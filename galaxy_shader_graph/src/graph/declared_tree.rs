/// Declared pass/alias tree of a Surface.
///
/// Nodes live in slotmap arenas keyed by `PassKey`/`AliasKey`; the tree keeps
/// a `NodeId -> key` index and a pre-order declaration order that the
/// resolver uses to break topological ties.

use slotmap::{new_key_type, SlotMap};
use rustc_hash::{FxHashMap, FxHashSet};
use crate::error::{Error, Result};
use super::commit::Commit;
use super::node::{NodeId, NodeDesc, PassDesc, AliasDesc};

new_key_type! {
    /// Arena key of a declared pass
    pub struct PassKey;
    /// Arena key of a declared alias
    pub struct AliasKey;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKey {
    Pass(PassKey),
    Alias(AliasKey),
}

/// Kind of a declared node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Pass,
    Alias,
}

/// Summary of what a commit changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedCommit {
    pub created: Vec<NodeId>,
    pub updated: Vec<NodeId>,
    /// Every removed node, sub-trees included
    pub removed: Vec<NodeId>,
}

impl AppliedCommit {
    /// Created and updated nodes
    pub fn touched(&self) -> FxHashSet<NodeId> {
        self.created.iter().chain(self.updated.iter()).copied().collect()
    }
}

/// The tree of declared nodes
#[derive(Debug, Clone, Default)]
pub struct DeclaredTree {
    passes: SlotMap<PassKey, PassDesc>,
    aliases: SlotMap<AliasKey, AliasDesc>,
    keys: FxHashMap<NodeId, NodeKey>,
    /// Children per parent, `None` holds the top-level nodes
    children: FxHashMap<Option<NodeId>, Vec<NodeId>>,
    /// Pre-order traversal of the whole tree
    order: Vec<NodeId>,
    positions: FxHashMap<NodeId, usize>,
}

impl DeclaredTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a commit atomically
    ///
    /// Creations are applied before the structure is checked, so nodes may
    /// reference parents created later in the same commit. An update equal to
    /// the current description is dropped and not reported as updated.
    ///
    /// # Errors
    ///
    /// Returns an error and leaves the tree untouched if the commit creates
    /// an existing id, updates or removes an unknown id, names an unknown
    /// parent, or introduces a parent cycle.
    pub fn apply(&mut self, commit: Commit) -> Result<AppliedCommit> {
        let backup = self.clone();
        match self.apply_inner(commit) {
            Ok(applied) => Ok(applied),
            Err(error) => {
                *self = backup;
                Err(error)
            }
        }
    }

    fn apply_inner(&mut self, commit: Commit) -> Result<AppliedCommit> {
        let mut applied = AppliedCommit::default();
        let mut removed = FxHashSet::default();

        for id in commit.removed {
            if removed.contains(&id) {
                continue;
            }
            if !self.keys.contains_key(&id) {
                return Err(Error::UnknownNode(format!("cannot remove {}: not declared", id)));
            }
            for node in self.subtree(id) {
                if removed.insert(node) {
                    self.remove_node(node);
                    applied.removed.push(node);
                }
            }
        }

        for node in commit.created {
            let id = node.id();
            if self.keys.contains_key(&id) {
                return Err(Error::InvalidResource(format!("node {} is already declared", id)));
            }
            self.insert_node(node);
            applied.created.push(id);
        }

        for node in commit.updated {
            let id = node.id();
            if !self.keys.contains_key(&id) {
                return Err(Error::UnknownNode(format!("cannot update {}: not declared", id)));
            }
            if self.node(id).as_ref() == Some(&node) {
                continue;
            }
            self.remove_node(id);
            self.insert_node(node);
            applied.updated.push(id);
        }

        self.rebuild_structure()?;
        Ok(applied)
    }

    fn insert_node(&mut self, node: NodeDesc) {
        let id = node.id();
        let key = match node {
            NodeDesc::Pass(pass) => NodeKey::Pass(self.passes.insert(pass)),
            NodeDesc::Alias(alias) => NodeKey::Alias(self.aliases.insert(alias)),
        };
        self.keys.insert(id, key);
    }

    fn node(&self, id: NodeId) -> Option<NodeDesc> {
        match self.keys.get(&id)? {
            NodeKey::Pass(key) => self.passes.get(*key).cloned().map(NodeDesc::Pass),
            NodeKey::Alias(key) => self.aliases.get(*key).cloned().map(NodeDesc::Alias),
        }
    }

    fn remove_node(&mut self, id: NodeId) {
        match self.keys.remove(&id) {
            Some(NodeKey::Pass(key)) => {
                self.passes.remove(key);
            }
            Some(NodeKey::Alias(key)) => {
                self.aliases.remove(key);
            }
            None => {}
        }
    }

    /// Node and all its descendants, pre-order
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            if let Some(children) = self.children.get(&Some(node)) {
                stack.extend(children.iter().rev().copied());
            }
        }
        nodes
    }

    fn rebuild_structure(&mut self) -> Result<()> {
        let mut children: FxHashMap<Option<NodeId>, Vec<(usize, NodeId)>> = FxHashMap::default();
        for (&id, _) in &self.keys {
            let (parent, index) = match self.node_parent_index(id) {
                Some(entry) => entry,
                None => continue,
            };
            if let Some(parent_id) = parent {
                if parent_id == id || !self.keys.contains_key(&parent_id) {
                    return Err(Error::UnknownNode(format!(
                        "parent {} of {} is not declared", parent_id, id
                    )));
                }
            }
            children.entry(parent).or_default().push((index, id));
        }

        self.children = children
            .into_iter()
            .map(|(parent, mut list)| {
                list.sort();
                (parent, list.into_iter().map(|(_, id)| id).collect())
            })
            .collect();

        let mut order = Vec::with_capacity(self.keys.len());
        let mut stack: Vec<NodeId> = self.children.get(&None)
            .map(|roots| roots.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(node) = stack.pop() {
            order.push(node);
            if let Some(list) = self.children.get(&Some(node)) {
                stack.extend(list.iter().rev().copied());
            }
        }

        if order.len() != self.keys.len() {
            return Err(Error::InvalidResource(
                "node parents form a cycle detached from the Surface".to_string()
            ));
        }

        self.positions = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        self.order = order;
        Ok(())
    }

    fn node_parent_index(&self, id: NodeId) -> Option<(Option<NodeId>, usize)> {
        match self.keys.get(&id)? {
            NodeKey::Pass(key) => self.passes.get(*key).map(|p| (p.parent, p.index)),
            NodeKey::Alias(key) => self.aliases.get(*key).map(|a| (a.parent, a.index)),
        }
    }

    // ===== QUERIES =====

    pub fn contains(&self, id: NodeId) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        match self.keys.get(&id)? {
            NodeKey::Pass(_) => Some(NodeKind::Pass),
            NodeKey::Alias(_) => Some(NodeKind::Alias),
        }
    }

    pub fn pass(&self, id: NodeId) -> Option<&PassDesc> {
        match self.keys.get(&id)? {
            NodeKey::Pass(key) => self.passes.get(*key),
            NodeKey::Alias(_) => None,
        }
    }

    pub fn alias(&self, id: NodeId) -> Option<&AliasDesc> {
        match self.keys.get(&id)? {
            NodeKey::Alias(key) => self.aliases.get(*key),
            NodeKey::Pass(_) => None,
        }
    }

    /// Every node in declaration (pre-order) order
    pub fn declaration_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Position of a node in declaration order
    pub fn declaration_index(&self, id: NodeId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Passes in declaration order
    pub fn passes(&self) -> impl Iterator<Item = &PassDesc> + '_ {
        self.order.iter().filter_map(move |id| self.pass(*id))
    }

    /// Ids of passes in declaration order
    pub fn pass_ids(&self) -> Vec<NodeId> {
        self.passes().map(|pass| pass.id).collect()
    }

    /// Direct children of a node, in sibling order
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(&Some(id)).map(|list| list.as_slice()).unwrap_or(&[])
    }

    /// Top-level nodes of the Surface, in sibling order
    pub fn top_level(&self) -> &[NodeId] {
        self.children.get(&None).map(|list| list.as_slice()).unwrap_or(&[])
    }

    /// The Surface output: first top-level pass
    pub fn root_pass(&self) -> Option<NodeId> {
        self.top_level().iter().copied().find(|id| self.kind(*id) == Some(NodeKind::Pass))
    }

    /// Closest pass ancestor, aliases skipped
    pub fn parent_pass(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.node_parent_index(id)?.0;
        while let Some(parent) = current {
            if self.kind(parent) == Some(NodeKind::Pass) {
                return Some(parent);
            }
            current = self.node_parent_index(parent)?.0;
        }
        None
    }

    /// Pixel size of a pass
    ///
    /// The root pass always matches the Surface. Other passes use their own
    /// size, falling back per axis to the closest pass ancestor, then the Surface.
    pub fn resolved_size(&self, id: NodeId, surface_size: (u32, u32)) -> (u32, u32) {
        if self.root_pass() == Some(id) {
            return (surface_size.0.max(1), surface_size.1.max(1));
        }
        let pass = match self.pass(id) {
            Some(pass) => pass,
            None => return surface_size,
        };
        let (parent_width, parent_height) = match self.parent_pass(id) {
            Some(parent) => self.resolved_size(parent, surface_size),
            None => surface_size,
        };
        (
            pass.width.unwrap_or(parent_width).max(1),
            pass.height.unwrap_or(parent_height).max(1),
        )
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn alias_count(&self) -> usize {
        self.aliases.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
#[path = "declared_tree_tests.rs"]
mod tests;
