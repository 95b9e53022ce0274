//! Inspection views of the reaction graph.
//!
//! Snapshots are plain owned data, detached from the arena, so a debugger or
//! binding layer can hold and serialize them while the engine keeps running.

use serde::Serialize;

use super::node::{ReactionNode, ReactionState};
use crate::reactive::{runtime, BoxId, ReactionId};

/// A point-in-time view of one reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionSnapshot {
    pub id: ReactionId,
    pub label: Option<String>,
    pub parent: Option<ReactionId>,
    pub children: Vec<ReactionId>,
    pub state: ReactionState,
    pub runs: u64,
    /// Boxes read through the tracker in the latest run.
    pub subscribed_reads: Vec<BoxId>,
    /// Boxes read directly in the latest run.
    pub passive_reads: Vec<BoxId>,
}

impl From<&ReactionNode> for ReactionSnapshot {
    fn from(node: &ReactionNode) -> Self {
        Self {
            id: node.id,
            label: node.label.clone(),
            parent: node.parent,
            children: node.children.iter().copied().collect(),
            state: node.state,
            runs: node.runs,
            subscribed_reads: node.subscribed.keys().copied().collect(),
            passive_reads: node.passive.iter().copied().collect(),
        }
    }
}

/// Every reaction created on the current thread, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub reactions: Vec<ReactionSnapshot>,
}

impl GraphSnapshot {
    /// Reactions without a parent.
    pub fn roots(&self) -> impl Iterator<Item = &ReactionSnapshot> {
        self.reactions.iter().filter(|r| r.parent.is_none())
    }

    pub fn get(&self, id: ReactionId) -> Option<&ReactionSnapshot> {
        self.reactions.get(id.index()).filter(|r| r.id == id)
    }

    /// Reactions currently holding at least one subscription.
    pub fn live(&self) -> impl Iterator<Item = &ReactionSnapshot> {
        self.reactions.iter().filter(|r| !r.subscribed_reads.is_empty())
    }
}

/// Capture the current thread's reaction graph.
pub fn snapshot() -> GraphSnapshot {
    runtime::with_arena(|nodes| GraphSnapshot {
        reactions: nodes.iter().map(ReactionSnapshot::from).collect(),
    })
}
