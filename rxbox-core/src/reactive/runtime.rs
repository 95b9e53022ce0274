//! Reactive Runtime
//!
//! The runtime owns every reaction on the current thread and implements the
//! algorithms that keep reactions in sync with the boxes they read.
//!
//! # How It Works
//!
//! 1. Creating a reaction allocates an arena slot, links it to the active
//!    reaction (its parent), and runs it once.
//!
//! 2. Running a reaction first unsubscribes it: its forward edges, the
//!    matching reverse edges on boxes, and its whole child subtree are torn
//!    down. The computation then rebuilds them by reading boxes through the
//!    tracker it is handed.
//!
//! 3. Writing a box hands a snapshot of its subscribers to `notify`, which
//!    runs each collapsed target or, for a paused one, marks it stale.
//!
//! 4. Resuming a paused reaction (running it again) skips its own
//!    computation unless it went stale, and then resumes its children.
//!
//! # Borrowing
//!
//! The arena sits in a `RefCell`. No borrow is held across a call into user
//! code or a recursive engine call: every step reads or writes the arena in a
//! short closure and copies out what it needs.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use super::context::ReactiveContext;
use super::ReactionId;
use super::Source;
use crate::error::{Error, Result};
use crate::graph::{Computation, NotificationPlan, ReactionNode, ReactionState};
use crate::reactive::{Reaction, Tracker};

type ReactionList = SmallVec<[ReactionId; 8]>;

thread_local! {
    static ARENA: RefCell<Vec<ReactionNode>> = const { RefCell::new(Vec::new()) };
}

/// Read-only access to the whole arena.
pub(crate) fn with_arena<R>(f: impl FnOnce(&[ReactionNode]) -> R) -> R {
    ARENA.with(|arena| f(&arena.borrow()))
}

/// Access to one reaction's slot.
pub(crate) fn with_node<R>(id: ReactionId, f: impl FnOnce(&mut ReactionNode) -> R) -> R {
    ARENA.with(|arena| f(&mut arena.borrow_mut()[id.index()]))
}

/// Allocate a reaction under the active one and perform its first run.
///
/// The slot exists even if the first run fails; the error is returned after
/// the active reaction has been restored.
pub(crate) fn create(label: Option<String>, computation: Computation) -> Result<ReactionId> {
    let parent = ReactiveContext::current_id();
    let id = ARENA.with(|arena| {
        let mut arena = arena.borrow_mut();
        let id = ReactionId::from_index(arena.len());
        arena.push(ReactionNode::new(id, label, parent, computation));
        if let Some(parent) = parent {
            arena[parent.index()].children.insert(id);
        }
        id
    });

    debug!(reaction = %id, parent = ?parent, "created reaction");
    run(id)?;
    Ok(id)
}

/// Run protocol for one reaction.
pub(crate) fn run(id: ReactionId) -> Result<()> {
    let resumed = with_node(id, |node| {
        if !node.is_paused() {
            return None;
        }
        // Nothing changed while paused; only the children may be stale.
        node.state = ReactionState::On;
        Some(node.children.iter().copied().collect::<ReactionList>())
    });
    if let Some(children) = resumed {
        trace!(reaction = %id, children = children.len(), "resumed without re-running");
        for child in children {
            run(child)?;
        }
        return Ok(());
    }

    // Taken before unsubscribing: a re-entered reaction keeps its edges
    let mut lease = ComputationLease::take(id)?;
    unsubscribe(id)?;

    let result = {
        let _ctx = ReactiveContext::enter(Some(id));
        let tracker = Tracker::new(id);
        lease.call(&tracker)
    };
    drop(lease);

    match &result {
        Ok(()) => {
            let (runs, edges) = with_node(id, |node| {
                node.runs += 1;
                // On even with no edges; such a reaction is just never notified
                node.state = ReactionState::On;
                (node.runs, node.subscribed.len())
            });
            trace!(reaction = %id, runs, edges, "ran reaction");
        }
        Err(err) => {
            with_node(id, |node| node.state = ReactionState::Off);
            debug!(reaction = %id, error = %err, "run failed");
        }
    }
    result
}

/// Tear down every edge and child of a reaction. No-op before its first run.
pub(crate) fn unsubscribe(id: ReactionId) -> Result<()> {
    let detached = with_node(id, |node| (node.runs > 0).then(|| node.detach()));
    let Some((children, subscribed)) = detached else {
        return Ok(());
    };

    for child in children {
        unsubscribe(child)?;
    }
    for source in subscribed.values() {
        source.remove_subscriber(id);
    }

    trace!(reaction = %id, edges = subscribed.len(), "unsubscribed");
    Ok(())
}

/// Pause a reaction and its whole subtree.
pub(crate) fn pause(id: ReactionId) -> Result<()> {
    let children: ReactionList = with_node(id, |node| node.children.iter().copied().collect());
    for child in children {
        pause(child)?;
    }
    with_node(id, |node| node.state = ReactionState::Paused);
    trace!(reaction = %id, "paused");
    Ok(())
}

/// Notification protocol for a written box.
///
/// `subscribers` must be a snapshot: running reactions mutates the live set.
pub(crate) fn notify(subscribers: &[ReactionId]) -> Result<()> {
    let plan = with_arena(|nodes| NotificationPlan::build(nodes, subscribers));
    if plan.is_empty() {
        return Ok(());
    }
    trace!(subscribers = subscribers.len(), targets = plan.len(), "notifying");

    for target in plan {
        let stale = with_node(target, |node| {
            // Missed writes coalesce into a single flag
            let suspended = node.is_suspended();
            if suspended {
                node.state = ReactionState::PausedStale;
            }
            suspended
        });
        if stale {
            trace!(reaction = %target, "marked stale");
            continue;
        }
        run(target)?;
    }
    Ok(())
}

/// Record a passive read by the active reaction.
pub(crate) fn record_passive(id: ReactionId, source: &dyn Source) -> Result<()> {
    with_node(id, |node| node.record_passive(source.id()))
}

/// Record a tracked read by `id`.
pub(crate) fn record_tracked(id: ReactionId, source: Rc<dyn Source>) -> Result<()> {
    with_node(id, |node| node.record_tracked(source))
}

/// Execute `f` with `parent` installed as the active reaction.
///
/// No reaction is created and the run protocol is not involved: reactions
/// created inside `f` simply become children of `parent`, so a later pause or
/// unsubscribe of `parent` cascades to them. The previous active reaction is
/// restored before `f`'s result (or error) is returned.
pub fn adopt<R>(parent: &Reaction, f: impl FnOnce() -> Result<R>) -> Result<R> {
    let _ctx = ReactiveContext::enter(Some(parent.id()));
    f()
}

/// A computation taken out of its slot for the duration of a run.
///
/// Putting it back happens in `Drop`, so an unwinding computation does not
/// leave its reaction without a body.
struct ComputationLease {
    id: ReactionId,
    computation: Option<Computation>,
}

impl ComputationLease {
    fn take(id: ReactionId) -> Result<Self> {
        let computation = with_node(id, |node| node.computation.take());
        match computation {
            Some(computation) => Ok(Self {
                id,
                computation: Some(computation),
            }),
            None => Err(Error::Reentrant { reaction: id }),
        }
    }

    fn call(&mut self, tracker: &Tracker) -> Result<()> {
        match self.computation.as_mut() {
            Some(computation) => computation(tracker),
            None => Err(Error::Reentrant { reaction: self.id }),
        }
    }
}

impl Drop for ComputationLease {
    fn drop(&mut self) {
        let computation = self.computation.take();
        ARENA.with(|arena| match arena.try_borrow_mut() {
            Ok(mut arena) => arena[self.id.index()].computation = computation,
            Err(_) => warn!(reaction = %self.id, "arena busy, computation lost"),
        });
    }
}
