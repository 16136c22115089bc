//! Typed property read path.
//!
//! Fixed-width kinds read into a stack scratch buffer capped at
//! [`FIXED_VALUE_CAPACITY`] and decode by tag. Text probes with a
//! zero-capacity read, allocates exactly the reported length, and reads
//! again. Transient failures skip the row; a fixed-width value longer than
//! the cap is a provider contract violation and aborts the session.

use perfpoll_core::error::ValueError;
use perfpoll_core::value::{CounterValue, FIXED_VALUE_CAPACITY};
use perfpoll_provider::source::{PropertyAccessor, Row};

/// Read and decode one row's value for `accessor`.
///
/// `Ok(None)` means the row is skipped for this handle (transient read or
/// decode failure). `Err` is reserved for contract violations.
pub fn read_cell<R: Row>(
    row: &R,
    accessor: &PropertyAccessor,
) -> Result<Option<CounterValue>, ValueError> {
    if accessor.tag.is_text() {
        return Ok(read_text(row, accessor));
    }

    let mut scratch = [0u8; FIXED_VALUE_CAPACITY];
    let len = match row.read(accessor, &mut scratch) {
        Ok(len) => len,
        Err(err) => {
            tracing::debug!(tag = %accessor.tag, error = %err, "row read failed; skipping row");
            return Ok(None);
        }
    };
    if len > FIXED_VALUE_CAPACITY {
        return Err(ValueError::Oversized {
            tag: accessor.tag,
            len,
            capacity: FIXED_VALUE_CAPACITY,
        });
    }

    match CounterValue::decode(accessor.tag, &scratch[..len]) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            tracing::debug!(tag = %accessor.tag, error = %err, "row decode failed; skipping row");
            Ok(None)
        }
    }
}

/// Two-phase string read: probe for length, then read exactly that many
/// bytes. Any failure skips the row.
fn read_text<R: Row>(row: &R, accessor: &PropertyAccessor) -> Option<CounterValue> {
    let required = match row.read(accessor, &mut []) {
        Ok(required) => required,
        Err(err) => {
            tracing::debug!(error = %err, "text length probe failed; skipping row");
            return None;
        }
    };

    let mut buf = vec![0u8; required];
    let len = match row.read(accessor, &mut buf) {
        Ok(len) => len,
        Err(err) => {
            tracing::debug!(error = %err, "text read failed; skipping row");
            return None;
        }
    };
    if len != required {
        tracing::debug!(required, len, "text length changed between reads; skipping row");
        return None;
    }

    match CounterValue::decode(accessor.tag, &buf) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(error = %err, "text decode failed; skipping row");
            None
        }
    }
}
