//! Transactions
//!
//! A transaction batches box writes. Inside the scope, `set` buffers the
//! value on the box and enlists the box in the current buffer; no reaction
//! runs. When the scope closes, every enlisted box is written for real, once,
//! with its last buffered value.
//!
//! "No transaction" and "an empty transaction" are distinct states: outside
//! any scope there is no buffer at all and writes notify immediately.
//!
//! Nested transactions are independent scopes. The inner one flushes its own
//! writes when it closes, which (since the outer buffer is current again at
//! that point) simply re-buffers them into the outer transaction. A failed
//! inner scope puts back whatever the outer scope had buffered on each box.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use super::{BoxId, Source};
use crate::error::Result;

type Buffer = IndexMap<BoxId, Enlisted>;

/// A box written in the current scope.
struct Enlisted {
    source: Rc<dyn Source>,
    /// The pending value the box held before this scope first wrote it.
    saved: Option<Box<dyn Any>>,
}

impl Enlisted {
    fn rollback(self) {
        self.source.restore_pending(self.saved);
    }
}

thread_local! {
    static BUFFER: RefCell<Option<Buffer>> = const { RefCell::new(None) };
}

/// Check if a transaction scope is open on this thread.
pub fn is_transaction_open() -> bool {
    BUFFER.with(|buffer| buffer.borrow().is_some())
}

/// Add a box with a pending value to the current buffer.
///
/// `previous` is the pending value the write replaced. Only the first write
/// in a scope keeps it.
pub(crate) fn enlist<T: 'static>(source: Rc<dyn Source>, previous: Option<T>) {
    BUFFER.with(|buffer| {
        if let Some(buffer) = buffer.borrow_mut().as_mut() {
            buffer.entry(source.id()).or_insert_with(|| Enlisted {
                source,
                saved: previous.map(|value| Box::new(value) as Box<dyn Any>),
            });
        }
    });
}

/// Run `f` with box writes batched, then apply them.
///
/// Returns `f`'s value. If `f` fails, its buffered writes are discarded and
/// the error is returned once the enclosing buffer has been restored. If a
/// flushed write fails (a reaction errored), the remaining writes of this
/// transaction are discarded and that error is returned.
///
/// # Example
///
/// ```rust
/// use rxbox_core::{transaction, Reaction, ValueBox};
///
/// let a = ValueBox::new(1);
/// let b = ValueBox::new(2);
/// let (ra, rb) = (a.clone(), b.clone());
/// let sum = Reaction::new(move |t| {
///     let _ = t.read(&ra)? + t.read(&rb)?;
///     Ok(())
/// })?;
///
/// transaction(|| {
///     a.set(10)?;
///     b.set(20)
/// })?;
/// // One run per written box, not per write
/// assert_eq!(sum.run_count(), 3);
/// # Ok::<(), rxbox_core::Error>(())
/// ```
pub fn transaction<R>(f: impl FnOnce() -> Result<R>) -> Result<R> {
    let scope = TransactionScope::open();
    let result = f();
    let buffered = scope.close();

    match result {
        Ok(value) => {
            flush(buffered)?;
            Ok(value)
        }
        Err(err) => {
            debug!(discarded = buffered.len(), "transaction failed");
            rollback(buffered);
            Err(err)
        }
    }
}

fn flush(buffered: Buffer) -> Result<()> {
    if buffered.is_empty() {
        return Ok(());
    }
    debug!(boxes = buffered.len(), "flushing transaction");

    let mut entries = buffered.into_values();
    while let Some(entry) = entries.next() {
        if let Err(err) = entry.source.flush_pending() {
            entries.for_each(Enlisted::rollback);
            return Err(err);
        }
    }
    Ok(())
}

fn rollback(buffered: Buffer) {
    buffered.into_values().for_each(Enlisted::rollback);
}

/// Installs a fresh buffer and restores the previous one on close or drop.
struct TransactionScope {
    previous: Option<Option<Buffer>>,
}

impl TransactionScope {
    fn open() -> Self {
        let previous = BUFFER.with(|buffer| buffer.replace(Some(Buffer::default())));
        Self {
            previous: Some(previous),
        }
    }

    /// Restore the previous buffer and hand back what this scope collected.
    fn close(mut self) -> Buffer {
        self.restore().unwrap_or_default()
    }

    fn restore(&mut self) -> Option<Buffer> {
        let previous = self.previous.take()?;
        BUFFER.with(|buffer| buffer.replace(previous))
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if let Some(collected) = self.restore() {
            rollback(collected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::reactive::ValueBox;

    #[test]
    fn no_transaction_by_default() {
        assert!(!is_transaction_open());
    }

    #[test]
    fn transaction_opens_and_closes_scope() {
        transaction(|| {
            assert!(is_transaction_open());
            Ok(())
        })
        .unwrap();
        assert!(!is_transaction_open());
    }

    #[test]
    fn transaction_returns_value() {
        let result = transaction(|| Ok(42)).unwrap();
        assert_eq!(result, 42);
    }

    #[test]
    fn writes_are_buffered_until_close() {
        let cell = ValueBox::new(1);

        transaction(|| {
            cell.set(2)?;
            assert!(cell.has_pending());
            // Reads inside the scope still see the committed value
            assert_eq!(cell.get()?, 1);
            Ok(())
        })
        .unwrap();

        assert!(!cell.has_pending());
        assert_eq!(cell.get().unwrap(), 2);
    }

    #[test]
    fn failed_transaction_discards_writes() {
        let cell = ValueBox::new(1);

        let err = transaction(|| {
            cell.set(2)?;
            Err::<(), _>(Error::computation("abort"))
        })
        .unwrap_err();

        assert!(matches!(err, Error::Computation(_)));
        assert!(!is_transaction_open());
        assert!(!cell.has_pending());
        assert_eq!(cell.get().unwrap(), 1);
    }

    #[test]
    fn nested_scope_restores_outer_buffer() {
        let outer = ValueBox::new(0);
        let inner = ValueBox::new(0);

        transaction(|| {
            outer.set(1)?;
            transaction(|| inner.set(1))?;
            // The inner flush re-buffered into the outer transaction
            assert!(is_transaction_open());
            assert!(inner.has_pending());
            assert!(outer.has_pending());
            Ok(())
        })
        .unwrap();

        assert_eq!(outer.get().unwrap(), 1);
        assert_eq!(inner.get().unwrap(), 1);
    }

    #[test]
    fn failed_inner_scope_keeps_outer_pending_value() {
        let cell = ValueBox::new(0);

        transaction(|| {
            cell.set(1)?;
            let inner = transaction(|| {
                cell.set(2)?;
                cell.set(3)?;
                Err::<(), _>(Error::computation("inner abort"))
            });
            assert!(inner.is_err());
            assert!(cell.has_pending());
            Ok(())
        })
        .unwrap();

        assert_eq!(cell.get().unwrap(), 1);
    }

    #[test]
    fn scope_restored_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _ = transaction(|| -> Result<()> { panic!("body panicked") });
        });

        assert!(result.is_err());
        assert!(!is_transaction_open());
    }
}
