//! Reactive Context
//!
//! The reactive context tracks which reaction is currently running.
//! This enables automatic dependency tracking: when a box is read, the
//! engine knows which reaction to attribute the read to.
//!
//! # Implementation
//!
//! The active reaction is a single per-thread slot, not a stack. Nesting is
//! expressed by save/restore: entering a context swaps the new reaction in
//! and keeps the previous one in a guard, and dropping the guard swaps it
//! back. Because restoration lives in `Drop`, it happens on every exit path,
//! including `?` early returns and unwinding.
//!
//! A second flag marks that a tracked read is resolving a box's value, so the
//! plain read it delegates to does not also record a passive read.

use std::cell::Cell;

use super::{Reaction, ReactionId};

thread_local! {
    static ACTIVE_REACTION: Cell<Option<ReactionId>> = const { Cell::new(None) };
    static TRACKED_READ: Cell<bool> = const { Cell::new(false) };
}

/// Guard that restores the previously active reaction when dropped.
pub struct ReactiveContext {
    previous: Option<ReactionId>,
}

impl ReactiveContext {
    /// Install `reaction` as the active one until the guard is dropped.
    pub(crate) fn enter(reaction: Option<ReactionId>) -> Self {
        let previous = ACTIVE_REACTION.with(|active| active.replace(reaction));
        Self { previous }
    }

    /// Check if a reaction is currently active.
    pub fn is_active() -> bool {
        Self::current_id().is_some()
    }

    /// Get the currently active reaction, if any.
    pub fn current_reaction() -> Option<Reaction> {
        Self::current_id().map(Reaction::from_id)
    }

    pub(crate) fn current_id() -> Option<ReactionId> {
        ACTIVE_REACTION.with(Cell::get)
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        ACTIVE_REACTION.with(|active| active.set(self.previous));
    }
}

/// Guard that suppresses passive-read bookkeeping for one tracked read.
pub(crate) struct TrackedRead {
    previous: bool,
}

impl TrackedRead {
    pub(crate) fn enter() -> Self {
        let previous = TRACKED_READ.with(|flag| flag.replace(true));
        Self { previous }
    }

    pub(crate) fn in_progress() -> bool {
        TRACKED_READ.with(Cell::get)
    }
}

impl Drop for TrackedRead {
    fn drop(&mut self) {
        TRACKED_READ.with(|flag| flag.set(self.previous));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_reaction() {
        let id = ReactionId::from_index(0);

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_id().is_none());

        {
            let _ctx = ReactiveContext::enter(Some(id));

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_id(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn nested_contexts_restore_previous() {
        let id1 = ReactionId::from_index(1);
        let id2 = ReactionId::from_index(2);

        {
            let _ctx1 = ReactiveContext::enter(Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(Some(id2));
                assert_eq!(ReactiveContext::current_id(), Some(id2));

                // Entering `None` hides the outer reactions
                let _untracked = ReactiveContext::enter(None);
                assert!(!ReactiveContext::is_active());
            }

            assert_eq!(ReactiveContext::current_id(), Some(id1));
        }

        assert!(ReactiveContext::current_id().is_none());
    }

    #[test]
    fn context_restored_on_unwind() {
        let id = ReactionId::from_index(4);

        let result = std::panic::catch_unwind(|| {
            let _ctx = ReactiveContext::enter(Some(id));
            panic!("computation panicked");
        });

        assert!(result.is_err());
        assert!(ReactiveContext::current_id().is_none());
    }

    #[test]
    fn tracked_read_flag_is_scoped() {
        assert!(!TrackedRead::in_progress());
        {
            let _read = TrackedRead::enter();
            assert!(TrackedRead::in_progress());
        }
        assert!(!TrackedRead::in_progress());
    }
}
