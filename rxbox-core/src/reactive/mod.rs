//! Reactive Primitives
//!
//! This module implements the reactive engine: boxes, reactions,
//! transactions and ownership scopes.
//!
//! # Concepts
//!
//! ## Boxes
//!
//! A box is a container for mutable state. When a reaction reads a box
//! through its tracker, the box records the reaction as a subscriber. When
//! the box is written, every subscriber re-runs synchronously.
//!
//! ## Reactions
//!
//! A reaction is a computation that re-runs whenever a tracked box changes.
//! Dependencies are discovered on each run; there is no manual
//! subscribe/unsubscribe. Reactions created inside a reaction are owned by
//! it, and pausing or unsubscribing cascades down that ownership tree.
//!
//! ## Transactions
//!
//! A transaction buffers box writes and applies them when it closes, so a
//! reaction depending on several written boxes is notified once per box
//! instead of once per write.
//!
//! # Implementation Notes
//!
//! The engine is single-threaded and synchronous. The active reaction and
//! the transaction buffer are per-thread slots, saved and restored by RAII
//! guards around every activation. Handles are `!Send` so they can never
//! reach another thread's runtime.

mod context;
mod ids;
mod reaction;
pub(crate) mod runtime;
mod transaction;
mod value_box;

pub use context::ReactiveContext;
pub use ids::{BoxId, ReactionId};
pub use reaction::{Reaction, Tracker};
pub use runtime::adopt;
pub use transaction::{is_transaction_open, transaction};
pub use value_box::{boxes, ValueBox};

pub(crate) use value_box::Source;
