//! Revision tree of a single document
//!
//! Revisions are kept in a node table keyed by [`RevisionId`], each node
//! holding its children's IDs; the parent link lives on the revision itself.
//! Concurrent writes against the same parent branch the tree, and unrelated
//! roots may coexist, so the structure is a forest rather than a chain.
//!
//! The set of leaves is maintained incrementally. The current revision is
//! the greatest leaf by [`RevisionId`] ordering (generation, then digest),
//! which depends only on the tree's contents and never on insertion order.

use crate::error::{Error, Result};
use crate::revision::{Revision, RevisionId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

struct Node {
    revision: Arc<Revision>,
    children: Vec<RevisionId>,
}

/// Branching history of all revisions of one document
#[derive(Default)]
pub struct RevisionTree {
    nodes: HashMap<RevisionId, Node>,
    leaves: BTreeSet<RevisionId>,
    current: Option<RevisionId>,
}

impl RevisionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &RevisionId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &RevisionId) -> Option<&Arc<Revision>> {
        self.nodes.get(id).map(|node| &node.revision)
    }

    /// Insert a revision under its parent.
    ///
    /// The parent must already be in the tree and the generation must follow
    /// it. Inserting an ID that is already present returns the stored
    /// revision unchanged. On error the tree is left untouched.
    pub fn insert(&mut self, revision: Revision) -> Result<Arc<Revision>> {
        if let Some(existing) = self.nodes.get(revision.id()) {
            return Ok(existing.revision.clone());
        }

        let expected_generation = match revision.parent_id() {
            Some(parent) => {
                if !self.nodes.contains_key(parent) {
                    return Err(Error::NotFound(format!("Parent revision {}", parent)));
                }
                parent.generation() + 1
            }
            None => 1,
        };
        if revision.generation() != expected_generation {
            return Err(Error::Validation(format!(
                "Revision {} must have generation {}",
                revision.id(),
                expected_generation
            )));
        }

        let id = revision.id().clone();
        if let Some(parent) = revision.parent_id() {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.push(id.clone());
            }
            self.leaves.remove(parent);
        }

        let revision = Arc::new(revision);
        self.nodes.insert(
            id.clone(),
            Node {
                revision: revision.clone(),
                children: Vec::new(),
            },
        );
        self.leaves.insert(id);
        self.current = self.leaves.last().cloned();

        debug_assert_eq!(self.current, self.compute_winner());
        Ok(revision)
    }

    /// Drop every revision
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.leaves.clear();
        self.current = None;
    }

    pub fn current_id(&self) -> Option<&RevisionId> {
        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&Arc<Revision>> {
        self.current.as_ref().and_then(|id| self.get(id))
    }

    /// Select the winner by scanning every node, ignoring cached leaves
    pub fn compute_winner(&self) -> Option<RevisionId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(id, _)| id)
            .max()
            .cloned()
    }

    pub fn is_leaf(&self, id: &RevisionId) -> bool {
        self.leaves.contains(id)
    }

    /// Leaf revisions, winner first
    pub fn leaves(&self) -> Vec<Arc<Revision>> {
        self.leaves
            .iter()
            .rev()
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }

    /// Leaves other than the current revision that are not its ancestors
    pub fn conflicts(&self) -> Vec<Arc<Revision>> {
        let Some(current) = self.current.as_ref() else {
            return Vec::new();
        };

        self.leaves
            .iter()
            .rev()
            .filter(|id| *id != current && !self.is_ancestor(id, current))
            .filter_map(|id| self.get(id).cloned())
            .collect()
    }

    pub fn has_conflicts(&self) -> bool {
        self.leaves.len() > 1
    }

    /// Returns true if `ancestor` is a strict ancestor of `descendant`
    pub fn is_ancestor(&self, ancestor: &RevisionId, descendant: &RevisionId) -> bool {
        if ancestor.generation() >= descendant.generation() {
            return false;
        }

        let mut cursor = self.get(descendant).and_then(|rev| rev.parent_id());
        while let Some(id) = cursor {
            if id == ancestor {
                return true;
            }
            if id.generation() <= ancestor.generation() {
                return false;
            }
            cursor = self.get(id).and_then(|rev| rev.parent_id());
        }
        false
    }

    /// Chain from the root down to `id`, root first
    pub fn history(&self, id: &RevisionId) -> Vec<Arc<Revision>> {
        let mut chain = Vec::new();
        let mut cursor = self.get(id);
        while let Some(rev) = cursor {
            chain.push(rev.clone());
            cursor = rev.parent_id().and_then(|parent| self.get(parent));
        }
        chain.reverse();
        chain
    }

    /// Every revision in insertion order, so parents precede children
    pub fn revisions(&self) -> Vec<Arc<Revision>> {
        let mut all: Vec<_> = self.nodes.values().map(|node| node.revision.clone()).collect();
        all.sort_by_key(|rev| rev.sequence());
        all
    }
}

impl std::fmt::Debug for RevisionTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevisionTree")
            .field("revisions", &self.nodes.len())
            .field("leaves", &self.leaves)
            .field("current", &self.current)
            .finish()
    }
}
