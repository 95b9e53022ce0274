//! Reaction Graph
//!
//! This module holds the data the engine keeps about reactions, and the
//! ordering logic it applies when a box changes.
//!
//! # Overview
//!
//! Two relations connect the graph:
//!
//! - Dependency edges: reaction -> box (forward, stored on the reaction) and
//!   box -> reaction (reverse, stored on the box). Both are rebuilt from
//!   scratch on every run.
//! - Ownership edges: reaction -> the reaction that was active when it was
//!   created. These never change and drive cascading pause/unsubscribe and
//!   ancestor collapsing during notification.
//!
//! # Design Decisions
//!
//! 1. Reactions live in a per-thread arena indexed by `ReactionId`. The
//!    parent link is a plain id, so the ownership tree needs no weak
//!    references.
//!
//! 2. Slots are never freed. A retired reaction stays `Off` and inspectable.

mod node;
mod scheduler;
mod snapshot;

pub use node::ReactionState;
pub use snapshot::{snapshot, GraphSnapshot, ReactionSnapshot};

pub(crate) use node::{Computation, ReactionNode};
pub(crate) use scheduler::NotificationPlan;
