//! rxbox Core
//!
//! This crate provides a fine-grained reactive-state runtime:
//!
//! - Boxes: mutable cells that notify dependents exactly when written
//! - Reactions: computations with automatically discovered dependencies
//! - An ownership tree: reactions created inside reactions are owned by them,
//!   for cascading pause/unsubscribe and for collapsing redundant re-runs
//! - Transactions: batched multi-write scopes
//!
//! Everything is in-process, single-threaded and synchronous. Every
//! operation has completed by the time it returns.
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: boxes, reactions, transactions and the run protocol
//! - `graph`: the per-reaction bookkeeping, notification ordering and
//!   inspection snapshots
//!
//! # Example
//!
//! ```rust
//! use rxbox_core::{transaction, Reaction, ValueBox};
//!
//! // Create a box
//! let count = ValueBox::new(0);
//!
//! // Create a reaction; it runs immediately and subscribes to `count`
//! let reader = count.clone();
//! let reaction = Reaction::new(move |t| {
//!     println!("Count: {}", t.read(&reader)?);
//!     Ok(())
//! })?;
//!
//! // Update the box; the reaction runs again, prints "Count: 5"
//! count.set(5)?;
//!
//! // Several writes, one notification
//! transaction(|| {
//!     count.set(6)?;
//!     count.set(7)
//! })?;
//! assert_eq!(reaction.run_count(), 3);
//! # Ok::<(), rxbox_core::Error>(())
//! ```

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::{Error, Result};
pub use graph::{GraphSnapshot, ReactionSnapshot, ReactionState};
pub use reactive::{
    adopt, boxes, is_transaction_open, transaction, BoxId, Reaction, ReactionId, ReactiveContext,
    Tracker, ValueBox,
};
