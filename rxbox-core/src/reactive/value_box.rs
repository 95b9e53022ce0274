//! Box Implementation
//!
//! A box is the leaf reactive primitive: a value cell that knows which
//! reactions depend on it.
//!
//! # How Boxes Work
//!
//! 1. A reaction reads a box through its [`Tracker`](super::Tracker). The
//!    box adds the reaction to its subscriber set and the reaction adds the
//!    box to its dependency set.
//!
//! 2. A plain [`ValueBox::get`] inside a reaction is a passive read: it is
//!    recorded on the reaction for consistency checking but creates no edge.
//!
//! 3. [`ValueBox::set`] stores the value and synchronously re-runs every
//!    subscriber. Inside a transaction the value is buffered instead and
//!    applied when the transaction closes.
//!
//! Writes are not deduplicated: setting an equal value still notifies.
//!
//! # Memory Layout
//!
//! Each box consists of:
//! - A unique ID and an optional label
//! - The value, behind a `RefCell`
//! - A pending value slot used by transactions
//! - The set of subscribed reaction IDs (reverse edges)

use std::any::Any;
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;
use tracing::trace;

use super::context::{ReactiveContext, TrackedRead};
use super::{runtime, transaction, BoxId, Reaction, ReactionId};
use crate::error::Result;

/// Type-erased view of a box, held by reactions and transaction buffers.
pub(crate) trait Source {
    fn id(&self) -> BoxId;

    /// Drop the reverse edge to `reaction`.
    fn remove_subscriber(&self, reaction: ReactionId);

    /// Apply the buffered value through a normal write.
    fn flush_pending(self: Rc<Self>) -> Result<()>;

    /// Replace the buffered value with one saved before the current scope
    /// first wrote, or clear it when `saved` is `None`.
    fn restore_pending(&self, saved: Option<Box<dyn Any>>);
}

struct BoxInner<T> {
    id: BoxId,
    label: Option<String>,
    value: RefCell<T>,
    /// Value written inside a transaction, not yet applied.
    pending: RefCell<Option<T>>,
    subscribers: RefCell<IndexSet<ReactionId>>,
}

/// A reactive box holding a value of type T.
///
/// Cloning a `ValueBox` clones the handle; both handles share one cell.
///
/// # Example
///
/// ```rust
/// use rxbox_core::{Reaction, ValueBox};
///
/// let count = ValueBox::new(1);
/// let reader = count.clone();
/// let reaction = Reaction::new(move |t| {
///     let _ = t.read(&reader)?;
///     Ok(())
/// })?;
///
/// count.set(2)?;
/// assert_eq!(reaction.run_count(), 2);
/// # Ok::<(), rxbox_core::Error>(())
/// ```
pub struct ValueBox<T> {
    inner: Rc<BoxInner<T>>,
}

impl<T> ValueBox<T>
where
    T: Clone + 'static,
{
    /// Create a new box with the given initial value.
    pub fn new(value: T) -> Self {
        Self::with_label(None, value)
    }

    /// Create a new box carrying a diagnostic label.
    pub fn named(label: impl Into<String>, value: T) -> Self {
        Self::with_label(Some(label.into()), value)
    }

    fn with_label(label: Option<String>, value: T) -> Self {
        Self {
            inner: Rc::new(BoxInner {
                id: BoxId::next(),
                label,
                value: RefCell::new(value),
                pending: RefCell::new(None),
                subscribers: RefCell::new(IndexSet::new()),
            }),
        }
    }

    /// Get the box's unique ID.
    pub fn id(&self) -> BoxId {
        self.inner.id
    }

    /// Get the box's label, if it was created with one.
    pub fn label(&self) -> Option<&str> {
        self.inner.label.as_deref()
    }

    /// Read the current value without subscribing.
    ///
    /// Inside a reaction this is recorded as a passive read, and fails if the
    /// same reaction already tracked this box during the current run.
    pub fn get(&self) -> Result<T> {
        if !TrackedRead::in_progress() {
            if let Some(active) = ReactiveContext::current_id() {
                runtime::record_passive(active, &*self.inner)?;
            }
        }
        Ok(self.inner.value.borrow().clone())
    }

    /// Write a new value and notify subscribers.
    ///
    /// Inside a transaction the value is buffered and this returns
    /// immediately; the last buffered value wins.
    pub fn set(&self, value: T) -> Result<()> {
        write(&self.inner, value)
    }

    /// Write a value derived from the current one.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.get()?);
        self.set(next)
    }

    /// Get the number of subscribed reactions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Get the subscribed reactions, in subscription order.
    pub fn subscribers(&self) -> Vec<Reaction> {
        self.inner
            .subscribers
            .borrow()
            .iter()
            .copied()
            .map(Reaction::from_id)
            .collect()
    }

    /// Whether a transaction has buffered a value that is not yet applied.
    pub fn has_pending(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    /// Read through the tracker of `reaction`, creating a dependency edge.
    pub(crate) fn tracked_read(&self, reaction: ReactionId) -> Result<T> {
        runtime::record_tracked(reaction, self.source())?;
        self.inner.subscribers.borrow_mut().insert(reaction);

        let _read = TrackedRead::enter();
        self.get()
    }

    pub(crate) fn source(&self) -> Rc<dyn Source> {
        self.inner.clone()
    }
}

fn write<T>(inner: &Rc<BoxInner<T>>, value: T) -> Result<()>
where
    T: Clone + 'static,
{
    if transaction::is_transaction_open() {
        let previous = inner.pending.replace(Some(value));
        transaction::enlist(inner.clone(), previous);
        return Ok(());
    }

    *inner.value.borrow_mut() = value;

    let subscribers: SmallVec<[ReactionId; 8]> =
        inner.subscribers.borrow().iter().copied().collect();
    trace!(source = %inner.id, subscribers = subscribers.len(), "write");
    runtime::notify(&subscribers)
}

impl<T> Source for BoxInner<T>
where
    T: Clone + 'static,
{
    fn id(&self) -> BoxId {
        self.id
    }

    fn remove_subscriber(&self, reaction: ReactionId) {
        self.subscribers.borrow_mut().shift_remove(&reaction);
    }

    fn flush_pending(self: Rc<Self>) -> Result<()> {
        // Cleared before writing so re-entrant writes never see it
        let next = self.pending.borrow_mut().take();
        match next {
            Some(value) => write(&self, value),
            None => Ok(()),
        }
    }

    fn restore_pending(&self, saved: Option<Box<dyn Any>>) {
        *self.pending.borrow_mut() = saved
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value);
    }
}

impl<T> Clone for ValueBox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for ValueBox<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<T> Eq for ValueBox<T> {}

impl<T> Debug for ValueBox<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueBox")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("value", &*self.inner.value.borrow())
            .field("subscriber_count", &self.inner.subscribers.borrow().len())
            .finish()
    }
}

/// Create one box per entry, labelled with the entry's key.
pub fn boxes<K, T, I>(entries: I) -> IndexMap<String, ValueBox<T>>
where
    K: Into<String>,
    T: Clone + 'static,
    I: IntoIterator<Item = (K, T)>,
{
    entries
        .into_iter()
        .map(|(key, value)| {
            let key = key.into();
            let cell = ValueBox::named(key.clone(), value);
            (key, cell)
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn box_get_and_set() {
        let cell = ValueBox::new(0);
        assert_eq!(cell.get().unwrap(), 0);

        cell.set(42).unwrap();
        assert_eq!(cell.get().unwrap(), 42);
    }

    #[test]
    fn box_update() {
        let cell = ValueBox::new(10);
        cell.update(|v| v + 5).unwrap();
        assert_eq!(cell.get().unwrap(), 15);
    }

    #[test]
    fn box_clone_shares_state() {
        let cell1 = ValueBox::new(0);
        let cell2 = cell1.clone();

        cell1.set(42).unwrap();
        assert_eq!(cell2.get().unwrap(), 42);
        assert_eq!(cell1, cell2);
    }

    #[test]
    fn box_ids_are_unique() {
        let b1 = ValueBox::new(0);
        let b2 = ValueBox::new(0);
        assert_ne!(b1.id(), b2.id());
        assert_ne!(b1, b2);
    }

    #[test]
    fn tracked_read_subscribes() {
        let cell = ValueBox::new(1);
        let runs = Rc::new(Cell::new(0));

        let reader = cell.clone();
        let counter = runs.clone();
        let reaction = Reaction::new(move |t| {
            t.read(&reader)?;
            counter.set(counter.get() + 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(cell.subscriber_count(), 1);
        assert_eq!(cell.subscribers(), vec![reaction]);

        cell.set(2).unwrap();
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn passive_read_does_not_subscribe() {
        let cell = ValueBox::new(1);
        let runs = Rc::new(Cell::new(0));

        let reader = cell.clone();
        let counter = runs.clone();
        let reaction = Reaction::new(move |_| {
            reader.get()?;
            counter.set(counter.get() + 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(cell.subscriber_count(), 0);
        assert_eq!(reaction.passive_reads(), vec![cell.id()]);

        cell.set(2).unwrap();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn equal_writes_still_notify() {
        let cell = ValueBox::new(7);
        let reader = cell.clone();
        let reaction = Reaction::new(move |t| {
            t.read(&reader)?;
            Ok(())
        })
        .unwrap();

        cell.set(7).unwrap();
        cell.set(7).unwrap();
        assert_eq!(reaction.run_count(), 3);
    }

    #[test]
    fn bulk_boxes_are_labelled_by_key() {
        let cells = boxes([("width", 10), ("height", 20)]);

        assert_eq!(cells.len(), 2);
        assert_eq!(cells["width"].label(), Some("width"));
        assert_eq!(cells["height"].get().unwrap(), 20);

        let keys: Vec<_> = cells.keys().cloned().collect();
        assert_eq!(keys, vec!["width", "height"]);
    }

    #[test]
    fn debug_shows_value_and_label() {
        let cell = ValueBox::named("count", 3);
        let rendered = format!("{cell:?}");
        assert!(rendered.contains("count"));
        assert!(rendered.contains("value: 3"));
    }
}
