//! Domain types for polled counter data.
//!
//! Columns are keyed by [`PropertyHandle`] in a `BTreeMap` so that every
//! iteration over a cycle's results is deterministic.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::CounterValue;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed property name bound into a poll session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyName(pub String);

impl fmt::Display for PropertyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for PropertyName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PropertyName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Stable integer key identifying a bound property across cycles.
///
/// Derived deterministically from the property name by
/// [`crate::bindings::BindingRegistry::bind`]; immutable once issued.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct PropertyHandle(pub u64);

impl fmt::Display for PropertyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

impl From<u64> for PropertyHandle {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

// ---------------------------------------------------------------------------
// Columns and snapshots
// ---------------------------------------------------------------------------

/// One bound property's values for one cycle, in enumeration order.
///
/// A row whose read failed is dropped from that column only, so columns in
/// the same cycle may have unequal lengths. Index `i` refers to "the same
/// row" across columns only when every read for that row succeeded.
pub type Column = Vec<CounterValue>;

/// All columns of one cycle, keyed by binding handle.
pub type ColumnMap = BTreeMap<PropertyHandle, Column>;

/// Paired column maps emitted once per poll cycle.
///
/// `previous` is always the `current` of the immediately prior cycle; on the
/// first cycle of a session it is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Wall-clock time the cycle committed.
    pub taken_at: DateTime<Utc>,
    pub current: ColumnMap,
    pub previous: ColumnMap,
}

impl Snapshot {
    /// This cycle's column for `handle`, if any row produced a value.
    pub fn column(&self, handle: PropertyHandle) -> Option<&Column> {
        self.current.get(&handle)
    }

    /// The prior cycle's column for `handle`.
    pub fn previous_column(&self, handle: PropertyHandle) -> Option<&Column> {
        self.previous.get(&handle)
    }

    /// True for the first cycle of a session.
    pub fn is_first(&self) -> bool {
        self.previous.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_displays_as_hex() {
        let handle = PropertyHandle(0xdead_beef);
        assert_eq!(handle.to_string(), "0x00000000deadbeef");
    }

    #[test]
    fn snapshot_column_lookup() {
        let mut current = ColumnMap::new();
        current.insert(PropertyHandle(1), vec![CounterValue::Uint64(7)]);
        let snapshot = Snapshot {
            taken_at: Utc::now(),
            current,
            previous: ColumnMap::new(),
        };
        assert_eq!(
            snapshot.column(PropertyHandle(1)),
            Some(&vec![CounterValue::Uint64(7)])
        );
        assert!(snapshot.column(PropertyHandle(2)).is_none());
        assert!(snapshot.is_first());
    }
}
