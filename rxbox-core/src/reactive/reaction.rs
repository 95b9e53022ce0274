//! Reaction Implementation
//!
//! A reaction is a computation that re-runs whenever a box it tracked
//! changes.
//!
//! # How Reactions Work
//!
//! 1. When created, the reaction runs immediately to establish its initial
//!    dependencies. The reaction active at that moment becomes its parent.
//!
//! 2. The computation receives a [`Tracker`]. Every box read through it
//!    becomes a dependency; boxes read with a plain `get` do not.
//!
//! 3. Before each run the reaction drops all of its dependencies and all of
//!    its children, so the dependency set always equals what the latest run
//!    read.
//!
//! # Ownership
//!
//! Reactions created during another reaction's run are its children.
//! Pausing or unsubscribing a reaction cascades to its children, and
//! re-running it replaces them.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use super::{runtime, BoxId, ReactionId, ValueBox};
use crate::error::Result;
use crate::graph::{ReactionSnapshot, ReactionState};

/// The tracked-read function handed to a reaction's computation.
pub struct Tracker {
    reaction: ReactionId,
    _not_send: PhantomData<Rc<()>>,
}

impl Tracker {
    pub(crate) fn new(reaction: ReactionId) -> Self {
        Self {
            reaction,
            _not_send: PhantomData,
        }
    }

    /// Read a box and subscribe the running reaction to it.
    ///
    /// Fails if the reaction already read this box passively in this run.
    pub fn read<T>(&self, source: &ValueBox<T>) -> Result<T>
    where
        T: Clone + 'static,
    {
        source.tracked_read(self.reaction)
    }

    /// The reaction this tracker belongs to.
    pub fn reaction(&self) -> Reaction {
        Reaction::from_id(self.reaction)
    }
}

/// Handle to a reaction in the current thread's runtime.
///
/// Handles are cheap to copy and do not keep anything alive: the reaction
/// lives in the runtime until the thread exits.
///
/// # Example
///
/// ```rust
/// use rxbox_core::{Reaction, ReactionState, ValueBox};
///
/// let count = ValueBox::new(1);
/// let reader = count.clone();
/// let reaction = Reaction::new(move |t| {
///     println!("count is {}", t.read(&reader)?);
///     Ok(())
/// })?;
///
/// reaction.pause()?;
/// count.set(2)?;
/// count.set(3)?;
/// assert_eq!(reaction.state(), ReactionState::PausedStale);
///
/// reaction.run()?; // resumes; runs once and sees 3
/// assert_eq!(reaction.run_count(), 2);
/// # Ok::<(), rxbox_core::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reaction {
    id: ReactionId,
    _not_send: PhantomData<Rc<()>>,
}

impl Reaction {
    /// Create a reaction and run it once.
    pub fn new<F>(computation: F) -> Result<Self>
    where
        F: FnMut(&Tracker) -> Result<()> + 'static,
    {
        runtime::create(None, Box::new(computation)).map(Self::from_id)
    }

    /// Create a labelled reaction and run it once.
    pub fn named<F>(label: impl Into<String>, computation: F) -> Result<Self>
    where
        F: FnMut(&Tracker) -> Result<()> + 'static,
    {
        runtime::create(Some(label.into()), Box::new(computation)).map(Self::from_id)
    }

    pub(crate) fn from_id(id: ReactionId) -> Self {
        Self {
            id,
            _not_send: PhantomData,
        }
    }

    /// Get the reaction's unique ID.
    pub fn id(&self) -> ReactionId {
        self.id
    }

    /// Get the reaction's label, if it was created with one.
    pub fn label(&self) -> Option<String> {
        runtime::with_node(self.id, |node| node.label.clone())
    }

    /// Force a run.
    ///
    /// On a paused reaction this resumes it: its own computation is skipped
    /// (nothing it read changed) and its children are run in turn. On a
    /// stale or unsubscribed reaction this performs a full run.
    pub fn run(&self) -> Result<()> {
        runtime::run(self.id)
    }

    /// Pause this reaction and every descendant.
    pub fn pause(&self) -> Result<()> {
        runtime::pause(self.id)
    }

    /// Drop every dependency and child. The reaction stays `Off` until run
    /// again.
    pub fn unsubscribe(&self) -> Result<()> {
        runtime::unsubscribe(self.id)
    }

    /// Get the lifecycle state.
    pub fn state(&self) -> ReactionState {
        runtime::with_node(self.id, |node| node.state)
    }

    /// Get the number of completed runs.
    pub fn run_count(&self) -> u64 {
        runtime::with_node(self.id, |node| node.runs)
    }

    /// The reaction that was active when this one was created.
    pub fn parent(&self) -> Option<Reaction> {
        runtime::with_node(self.id, |node| node.parent).map(Self::from_id)
    }

    /// Reactions created during this reaction's latest run.
    pub fn children(&self) -> Vec<Reaction> {
        runtime::with_node(self.id, |node| {
            node.children.iter().copied().map(Self::from_id).collect()
        })
    }

    /// Boxes tracked during the latest run.
    pub fn dependencies(&self) -> Vec<BoxId> {
        runtime::with_node(self.id, |node| node.subscribed.keys().copied().collect())
    }

    /// Boxes read passively during the latest run.
    pub fn passive_reads(&self) -> Vec<BoxId> {
        runtime::with_node(self.id, |node| node.passive.iter().copied().collect())
    }

    /// A detached copy of this reaction's bookkeeping.
    pub fn snapshot(&self) -> ReactionSnapshot {
        runtime::with_node(self.id, |node| ReactionSnapshot::from(&*node))
    }
}

impl fmt::Debug for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reaction").field("id", &self.id).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
