//! Graph Nodes
//!
//! This module defines the per-reaction record stored in the reaction arena.

use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::reactive::{BoxId, ReactionId, Source, Tracker};

/// The computation wrapped by a reaction.
pub(crate) type Computation = Box<dyn FnMut(&Tracker) -> Result<()>>;

/// Lifecycle state of a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReactionState {
    /// Actively tracking its dependencies.
    On,

    /// Suspended. Writes to its dependencies do not re-run it.
    Paused,

    /// Suspended, and at least one dependency changed meanwhile.
    /// Any number of missed writes collapse into this single flag.
    PausedStale,

    /// Unsubscribed. No dependency edges exist until it runs again.
    Off,
}

/// A reaction's slot in the arena.
pub(crate) struct ReactionNode {
    pub(crate) id: ReactionId,
    pub(crate) label: Option<String>,

    /// The reaction active when this one was created. Fixed for life.
    pub(crate) parent: Option<ReactionId>,

    /// Reactions created while this one was active, since its last run.
    pub(crate) children: IndexSet<ReactionId>,

    /// Boxes read through the tracker in the latest run. These are the
    /// forward edges; each box holds the matching reverse edge.
    pub(crate) subscribed: IndexMap<BoxId, Rc<dyn Source>>,

    /// Boxes read directly in the latest run. Recorded, never subscribed.
    pub(crate) passive: IndexSet<BoxId>,

    pub(crate) runs: u64,
    pub(crate) state: ReactionState,

    /// Taken out while the computation executes.
    pub(crate) computation: Option<Computation>,
}

impl ReactionNode {
    pub(crate) fn new(
        id: ReactionId,
        label: Option<String>,
        parent: Option<ReactionId>,
        computation: Computation,
    ) -> Self {
        Self {
            id,
            label,
            parent,
            children: IndexSet::new(),
            subscribed: IndexMap::new(),
            passive: IndexSet::new(),
            runs: 0,
            state: ReactionState::On,
            computation: Some(computation),
        }
    }

    /// Record a passive read, rejecting a box already tracked this run.
    pub(crate) fn record_passive(&mut self, box_id: BoxId) -> Result<()> {
        if self.subscribed.contains_key(&box_id) {
            return Err(Error::PassiveAfterTracked {
                box_id,
                reaction: self.id,
            });
        }
        self.passive.insert(box_id);
        Ok(())
    }

    /// Record a tracked read, rejecting a box already read passively this run.
    pub(crate) fn record_tracked(&mut self, source: Rc<dyn Source>) -> Result<()> {
        let box_id = source.id();
        if self.passive.contains(&box_id) {
            return Err(Error::TrackedAfterPassive {
                box_id,
                reaction: self.id,
            });
        }
        self.subscribed.entry(box_id).or_insert(source);
        Ok(())
    }

    /// Take the child set and the forward edges, leaving the node `Off`.
    pub(crate) fn detach(&mut self) -> (IndexSet<ReactionId>, IndexMap<BoxId, Rc<dyn Source>>) {
        self.passive.clear();
        self.state = ReactionState::Off;
        (
            std::mem::take(&mut self.children),
            std::mem::take(&mut self.subscribed),
        )
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.state == ReactionState::Paused
    }

    /// Paused, whether or not a write was missed.
    pub(crate) fn is_suspended(&self) -> bool {
        matches!(self.state, ReactionState::Paused | ReactionState::PausedStale)
    }
}

impl fmt::Debug for ReactionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionNode")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("subscribed", &self.subscribed.keys().collect::<Vec<_>>())
            .field("passive", &self.passive)
            .field("runs", &self.runs)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::reactive::ValueBox;

    pub(crate) fn node(index: usize, parent: Option<usize>) -> ReactionNode {
        ReactionNode::new(
            ReactionId::from_index(index),
            None,
            parent.map(ReactionId::from_index),
            Box::new(|_| Ok(())),
        )
    }

    #[test]
    fn new_node_starts_on_without_edges() {
        let node = node(0, None);
        assert_eq!(node.state, ReactionState::On);
        assert_eq!(node.runs, 0);
        assert!(node.subscribed.is_empty());
        assert!(node.computation.is_some());
    }

    #[test]
    fn passive_then_tracked_is_rejected() {
        let mut node = node(0, None);
        let cell = ValueBox::new(1);

        node.record_passive(cell.id()).unwrap();
        let err = node.record_tracked(cell.source()).unwrap_err();
        assert!(matches!(err, Error::TrackedAfterPassive { .. }));
    }

    #[test]
    fn tracked_then_passive_is_rejected() {
        let mut node = node(0, None);
        let cell = ValueBox::new(1);

        node.record_tracked(cell.source()).unwrap();
        // Tracking twice is fine
        node.record_tracked(cell.source()).unwrap();
        assert_eq!(node.subscribed.len(), 1);

        let err = node.record_passive(cell.id()).unwrap_err();
        assert!(matches!(err, Error::PassiveAfterTracked { .. }));
    }

    #[test]
    fn detach_clears_edges_and_turns_off() {
        let mut node = node(0, None);
        let cell = ValueBox::new(1);
        let other = ValueBox::new(2);

        node.record_tracked(cell.source()).unwrap();
        node.record_passive(other.id()).unwrap();
        node.children.insert(ReactionId::from_index(5));

        let (children, subscribed) = node.detach();
        assert_eq!(children.len(), 1);
        assert_eq!(subscribed.len(), 1);
        assert!(node.children.is_empty());
        assert!(node.subscribed.is_empty());
        assert!(node.passive.is_empty());
        assert_eq!(node.state, ReactionState::Off);
    }
}
