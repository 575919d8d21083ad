//! Decision node arena.
//!
//! The backtracking search is an explicit stack of indices into this arena,
//! not language-level recursion, so memory stays bounded and cancellation
//! can happen deterministically at any depth.

use crate::model::EntryCandidate;

pub type NodeId = usize;

/// Outcome of one node. Pending until exactly one terminal attempt has been
/// made (or the node's subtree has resolved, for internal nodes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOutcome {
    Pending,
    Success,
    Failed,
}

/// One point in the search tree: a candidate strategy and what became of it.
#[derive(Debug)]
pub struct DecisionNode {
    /// `None` only for the root, which stands for the target itself.
    pub candidate: Option<EntryCandidate>,
    pub parent: Option<NodeId>,
    /// Populated lazily as candidate attempts reveal new pages.
    pub children: Vec<NodeId>,
    pub outcome: NodeOutcome,
}

/// Arena holding the tree for one target's traversal. Owned exclusively by
/// the engine for the duration of the traversal, discarded at terminal state.
#[derive(Debug)]
pub struct DecisionArena {
    nodes: Vec<DecisionNode>,
}

impl DecisionArena {
    /// New arena with a root node representing the target.
    pub fn new() -> Self {
        Self {
            nodes: vec![DecisionNode {
                candidate: None,
                parent: None,
                children: Vec::new(),
                outcome: NodeOutcome::Pending,
            }],
        }
    }

    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &DecisionNode {
        &self.nodes[id]
    }

    pub fn add_child(&mut self, parent: NodeId, candidate: EntryCandidate) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(DecisionNode {
            candidate: Some(candidate),
            parent: Some(parent),
            children: Vec::new(),
            outcome: NodeOutcome::Pending,
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Seed a node's children from a candidate sequence, preserving order.
    pub fn seed_children(&mut self, parent: NodeId, candidates: Vec<EntryCandidate>) {
        for cand in candidates {
            self.add_child(parent, cand);
        }
    }

    pub fn set_outcome(&mut self, id: NodeId, outcome: NodeOutcome) {
        self.nodes[id].outcome = outcome;
    }

    /// The not-yet-attempted child with the lexicographically smallest
    /// `(priority, -confidence)` key. Children were seeded in generation
    /// order and `min_by_key` keeps the first minimum, so ties resolve to
    /// generation order.
    pub fn next_untried_child(&self, parent: NodeId) -> Option<NodeId> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].outcome == NodeOutcome::Pending)
            .min_by_key(|&c| {
                self.nodes[c]
                    .candidate
                    .as_ref()
                    .map(|cand| cand.order_key())
                    .unwrap_or((u8::MAX, 0))
            })
    }

    /// Pending children of a node, in child order. Used when a deadline
    /// expires and remaining siblings must be recorded as skipped.
    pub fn pending_children(&self, parent: NodeId) -> Vec<NodeId> {
        self.nodes[parent]
            .children
            .iter()
            .copied()
            .filter(|&c| self.nodes[c].outcome == NodeOutcome::Pending)
            .collect()
    }

    /// Distance from the root (root itself is depth 0).
    pub fn depth(&self, mut id: NodeId) -> usize {
        let mut depth = 0;
        while let Some(parent) = self.nodes[id].parent {
            depth += 1;
            id = parent;
        }
        depth
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for DecisionArena {
    fn default() -> Self {
        Self::new()
    }
}
