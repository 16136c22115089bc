//! Enumeration buffer manager.
//!
//! [`EnumBuffer`] owns the row slots handed to the provider each cycle.
//! Capacity only grows across a session, so a steady-state source stops
//! reallocating after the first cycle. [`EnumBuffer::fill`] implements the
//! undersized-buffer protocol: on `BufferTooSmall { required }` with
//! `required` above the current capacity, grow to exactly `required` and
//! retry exactly once; any other failure degrades the cycle to zero rows
//! and the session continues.
//!
//! Row release is structural: `fill` returns a [`RowBatch`] that mutably
//! borrows the slots, so the next `fill` cannot start while rows are alive,
//! and dropping the batch clears every slot on every exit path.

use perfpoll_provider::error::EnumerateError;
use perfpoll_provider::source::Enumerator;

/// Growable buffer of row slots, exclusively owned by one session.
#[derive(Debug)]
pub struct EnumBuffer<R> {
    slots: Vec<Option<R>>,
}

impl<R> EnumBuffer<R> {
    /// Starts empty; the first cycle's `BufferTooSmall` sizes it.
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Current slot capacity. Monotonically non-decreasing.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Run one cycle's refresh + enumerate and return the rows.
    ///
    /// Never fails: a refresh failure, a second `BufferTooSmall`, a
    /// `BufferTooSmall` that does not ask for growth, or any other
    /// enumeration failure all yield an empty batch.
    pub fn fill<E>(&mut self, enumerator: &mut E) -> RowBatch<'_, R>
    where
        E: Enumerator<Row = R>,
    {
        if let Err(err) = enumerator.refresh() {
            tracing::warn!(error = %err, "refresh failed; cycle degrades to empty");
            return RowBatch::empty(&mut self.slots);
        }

        self.clear_slots();
        match enumerator.enumerate(&mut self.slots) {
            Ok(count) => RowBatch::new(&mut self.slots, count),
            Err(EnumerateError::BufferTooSmall { required }) if required > self.slots.len() => {
                tracing::debug!(
                    from = self.slots.len(),
                    to = required,
                    "growing enumeration buffer"
                );
                self.slots.resize_with(required, || None);
                self.clear_slots();
                match enumerator.enumerate(&mut self.slots) {
                    Ok(count) => RowBatch::new(&mut self.slots, count),
                    Err(err) => {
                        tracing::warn!(error = %err, "enumerate retry failed; cycle degrades to empty");
                        RowBatch::empty(&mut self.slots)
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "enumerate failed; cycle degrades to empty");
                RowBatch::empty(&mut self.slots)
            }
        }
    }

    fn clear_slots(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

impl<R> Default for EnumBuffer<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// One cycle's enumerated rows. Dropping the batch releases every row.
#[derive(Debug)]
pub struct RowBatch<'a, R> {
    slots: &'a mut Vec<Option<R>>,
    count: usize,
}

impl<'a, R> RowBatch<'a, R> {
    fn new(slots: &'a mut Vec<Option<R>>, count: usize) -> Self {
        Self { slots, count }
    }

    fn empty(slots: &'a mut Vec<Option<R>>) -> Self {
        Self { slots, count: 0 }
    }

    /// Row count reported by the provider for this cycle.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The enumerated rows, in enumeration order.
    pub fn rows(&self) -> impl Iterator<Item = &R> {
        self.slots[..self.count].iter().filter_map(Option::as_ref)
    }

    /// The first row, used to resolve property accessors for the batch.
    pub fn first(&self) -> Option<&R> {
        self.rows().next()
    }
}

impl<R> Drop for RowBatch<'_, R> {
    fn drop(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}
