//! Per-cycle snapshot store: the working column map plus the prior cycle's.
//!
//! The current→previous handoff happens only inside [`SnapshotStore::commit_cycle`],
//! so it is never observable mid-cycle.

use chrono::Utc;

use crate::types::{ColumnMap, PropertyHandle, Snapshot};
use crate::value::CounterValue;

/// Accumulates one cycle's columns and pairs them with the prior cycle's on
/// commit.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: ColumnMap,
    previous: ColumnMap,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the working column map for a new cycle.
    pub fn begin_cycle(&mut self) {
        self.current.clear();
    }

    /// Append `value` to `handle`'s column. Rows must be recorded in
    /// enumeration order so index `i` lines up across columns whenever every
    /// read for that row succeeded.
    pub fn record(&mut self, handle: PropertyHandle, value: CounterValue) {
        self.current.entry(handle).or_default().push(value);
    }

    /// Finish the cycle: return `{current, previous}`, then rotate so this
    /// cycle's columns become the next cycle's `previous`.
    pub fn commit_cycle(&mut self) -> Snapshot {
        let current = std::mem::take(&mut self.current);
        let previous = std::mem::replace(&mut self.previous, current.clone());
        Snapshot {
            taken_at: Utc::now(),
            current,
            previous,
        }
    }
}
