//! Error types for the reactive engine.
//!
//! Every failure is raised synchronously to the nearest caller. The engine
//! restores its per-thread state (active reaction, transaction buffer) before
//! an error is returned, so a failing computation never leaves a stale
//! activation behind for sibling or ancestor code.

use thiserror::Error;

use crate::reactive::{BoxId, ReactionId};

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by boxes, reactions and transactions.
#[derive(Debug, Error)]
pub enum Error {
    /// A reaction passively read a box it already tracked in this run.
    #[error("mixed sr/pr: {reaction} passively read {box_id} after tracking it")]
    PassiveAfterTracked {
        /// The box that was read both ways.
        box_id: BoxId,
        /// The reaction that performed the reads.
        reaction: ReactionId,
    },

    /// A reaction tracked a box it already read passively in this run.
    #[error("mixed pr/sr: {reaction} tracked {box_id} after reading it passively")]
    TrackedAfterPassive {
        /// The box that was read both ways.
        box_id: BoxId,
        /// The reaction that performed the reads.
        reaction: ReactionId,
    },

    /// A reaction was asked to run while its own computation was still executing.
    ///
    /// This happens when a computation writes to a box it (or one of its
    /// callers) depends on, forming a write cycle.
    #[error("{reaction} re-entered while its computation was running")]
    Reentrant {
        /// The reaction that was re-entered.
        reaction: ReactionId,
    },

    /// A reaction's computation failed.
    #[error("computation failed: {0}")]
    Computation(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
    /// Wrap an arbitrary error (or message) raised by a computation.
    pub fn computation<E>(err: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self::Computation(err.into())
    }

    /// Whether this error is a mixed tracked/passive read violation.
    pub fn is_mixed_read(&self) -> bool {
        matches!(
            self,
            Self::PassiveAfterTracked { .. } | Self::TrackedAfterPassive { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computation_error_wraps_message() {
        let err = Error::computation("boom");
        assert_eq!(err.to_string(), "computation failed: boom");
        assert!(!err.is_mixed_read());
    }

    #[test]
    fn mixed_read_errors_are_classified() {
        let source = BoxId::next();
        let reaction = ReactionId::from_index(3);

        let err = Error::PassiveAfterTracked { box_id: source, reaction };
        assert!(err.is_mixed_read());
        assert!(err.to_string().contains("R3"));

        let err = Error::TrackedAfterPassive { box_id: source, reaction };
        assert!(err.is_mixed_read());
    }
}
