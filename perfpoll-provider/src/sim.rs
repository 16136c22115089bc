//! Deterministic in-memory provider.
//!
//! `SimLocator` implements the full contract over scripted tables, so the
//! engine can be exercised without a live counter source: per-cycle row
//! sets, scriptable refresh and enumeration failures (including the
//! buffer-too-small protocol), per-property encoded values, and a live-row
//! counter that proves every row is released each cycle.
//!
//! Values encode exactly as the contract demands: little-endian for
//! fixed-width kinds, UTF-8 for text. `read` returns the value's full byte
//! length and writes `min(len, capacity)` bytes.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use perfpoll_core::config::Credentials;
use perfpoll_core::value::TypeTag;

use crate::error::{
    AccessError, ConnectError, EnumerateError, ReadError, RefreshError, SetupError,
};
use crate::source::{Connection, Enumerator, Locator, PropertyAccessor, Row};

// ---------------------------------------------------------------------------
// Row specs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct SimCell {
    tag: TypeTag,
    bytes: Vec<u8>,
    fail_read: bool,
}

/// Builder for one scripted row: property name → typed, encoded value.
#[derive(Debug, Clone, Default)]
pub struct SimRowSpec {
    cells: BTreeMap<u64, SimCell>,
}

impl SimRowSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uint32(self, property: &str, value: u32) -> Self {
        self.cell(property, TypeTag::Uint32, value.to_le_bytes().to_vec())
    }

    pub fn sint32(self, property: &str, value: i32) -> Self {
        self.cell(property, TypeTag::Sint32, value.to_le_bytes().to_vec())
    }

    pub fn uint64(self, property: &str, value: u64) -> Self {
        self.cell(property, TypeTag::Uint64, value.to_le_bytes().to_vec())
    }

    pub fn sint64(self, property: &str, value: i64) -> Self {
        self.cell(property, TypeTag::Sint64, value.to_le_bytes().to_vec())
    }

    pub fn real32(self, property: &str, value: f32) -> Self {
        self.cell(property, TypeTag::Real32, value.to_le_bytes().to_vec())
    }

    pub fn real64(self, property: &str, value: f64) -> Self {
        self.cell(property, TypeTag::Real64, value.to_le_bytes().to_vec())
    }

    pub fn boolean(self, property: &str, value: bool) -> Self {
        self.cell(property, TypeTag::Boolean, vec![u8::from(value)])
    }

    pub fn text(self, property: &str, value: &str) -> Self {
        self.cell(property, TypeTag::Text, value.as_bytes().to_vec())
    }

    /// Raw bytes under an arbitrary tag — for malformed-value tests.
    pub fn raw(self, property: &str, tag: TypeTag, bytes: Vec<u8>) -> Self {
        self.cell(property, tag, bytes)
    }

    /// A property whose accessor resolves but whose every read fails.
    pub fn failing_read(mut self, property: &str, tag: TypeTag) -> Self {
        self.cells.insert(
            accessor_handle(property),
            SimCell {
                tag,
                bytes: Vec::new(),
                fail_read: true,
            },
        );
        self
    }

    fn cell(mut self, property: &str, tag: TypeTag, bytes: Vec<u8>) -> Self {
        self.cells.insert(
            accessor_handle(property),
            SimCell {
                tag,
                bytes,
                fail_read: false,
            },
        );
        self
    }
}

/// FNV-1a of the property name; stable for the process, unique enough for
/// scripted tables.
fn accessor_handle(property: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in property.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

// ---------------------------------------------------------------------------
// Class state and scripting handle
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ClassState {
    /// Tables queued for upcoming refreshes; when exhausted, the current
    /// table repeats.
    pending_tables: VecDeque<Vec<SimRowSpec>>,
    current: Vec<SimRowSpec>,
    refresh_failures: VecDeque<String>,
    /// Countdown of enumerate calls forced to report `BufferTooSmall`,
    /// with the required count to report.
    wedged_enumerations: usize,
    wedged_required: usize,
    enumerate_failures: VecDeque<String>,
    capacity_history: Vec<usize>,
}

/// Scripting handle for one simulated class. Cloneable; all clones and all
/// enumerators opened for the class share state.
#[derive(Debug, Clone, Default)]
pub struct SimClass {
    state: Arc<Mutex<ClassState>>,
    live_rows: Arc<AtomicUsize>,
}

impl SimClass {
    /// Queue a table to be served by the next refresh. Once served it stays
    /// current until another queued table replaces it.
    pub fn push_table(&self, rows: Vec<SimRowSpec>) {
        self.lock().pending_tables.push_back(rows);
    }

    /// Make the next refresh fail with `reason`.
    pub fn fail_next_refresh(&self, reason: &str) {
        self.lock().refresh_failures.push_back(reason.to_owned());
    }

    /// Make the next enumerate call fail outright with `reason`.
    pub fn fail_next_enumerate(&self, reason: &str) {
        self.lock().enumerate_failures.push_back(reason.to_owned());
    }

    /// Force the next `calls` enumerate calls to report
    /// `BufferTooSmall { required }` regardless of the supplied capacity.
    /// Two calls wedge both the initial attempt and the engine's retry.
    pub fn wedge_enumeration(&self, calls: usize, required: usize) {
        let mut state = self.lock();
        state.wedged_enumerations = calls;
        state.wedged_required = required;
    }

    /// Rows currently held alive by callers (created minus dropped).
    pub fn live_rows(&self) -> usize {
        self.live_rows.load(Ordering::SeqCst)
    }

    /// Slot capacity the engine offered on each enumerate call, in order.
    pub fn capacity_history(&self) -> Vec<usize> {
        self.lock().capacity_history.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClassState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Locator / connection
// ---------------------------------------------------------------------------

/// In-memory locator. Accepts exactly one namespace and, optionally,
/// requires matching credentials.
#[derive(Debug, Clone)]
pub struct SimLocator {
    namespace: String,
    required_credentials: Option<Credentials>,
    classes: Arc<Mutex<BTreeMap<String, SimClass>>>,
}

impl SimLocator {
    pub fn new() -> Self {
        Self::with_namespace("root/cimv2")
    }

    pub fn with_namespace(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_owned(),
            required_credentials: None,
            classes: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Reject connections whose credentials don't match `credentials`.
    pub fn require_credentials(mut self, credentials: Credentials) -> Self {
        self.required_credentials = Some(credentials);
        self
    }

    /// Register `class_name` and return its scripting handle.
    pub fn add_class(&self, class_name: &str) -> SimClass {
        let class = SimClass::default();
        self.classes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(class_name.to_owned(), class.clone());
        class
    }
}

impl Default for SimLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl Locator for SimLocator {
    type Connection = SimConnection;

    fn connect(
        &self,
        namespace: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Self::Connection, ConnectError> {
        if namespace != self.namespace {
            return Err(ConnectError::NamespaceUnavailable {
                namespace: namespace.to_owned(),
                reason: format!("simulator only serves {}", self.namespace),
            });
        }
        if let Some(required) = &self.required_credentials {
            if credentials != Some(required) {
                return Err(ConnectError::AuthenticationRejected {
                    namespace: namespace.to_owned(),
                });
            }
        }
        Ok(SimConnection {
            classes: self.classes.clone(),
        })
    }
}

/// Connection handle returned by [`SimLocator::connect`].
#[derive(Debug, Clone)]
pub struct SimConnection {
    classes: Arc<Mutex<BTreeMap<String, SimClass>>>,
}

impl Connection for SimConnection {
    type Enumerator = SimEnumerator;

    fn open_enumerator(&self, class_name: &str) -> Result<Self::Enumerator, SetupError> {
        let classes = self
            .classes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let class = classes.get(class_name).ok_or_else(|| SetupError::NoSuchClass {
            class_name: class_name.to_owned(),
        })?;
        Ok(SimEnumerator {
            class: class.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// Enumerator / rows
// ---------------------------------------------------------------------------

/// Enumerator over one simulated class.
#[derive(Debug)]
pub struct SimEnumerator {
    class: SimClass,
}

impl Enumerator for SimEnumerator {
    type Row = SimRow;

    fn refresh(&mut self) -> Result<(), RefreshError> {
        let mut state = self.class.lock();
        if let Some(reason) = state.refresh_failures.pop_front() {
            return Err(RefreshError { reason });
        }
        if let Some(table) = state.pending_tables.pop_front() {
            state.current = table;
        }
        Ok(())
    }

    fn enumerate(&mut self, slots: &mut [Option<Self::Row>]) -> Result<usize, EnumerateError> {
        let mut state = self.class.lock();
        state.capacity_history.push(slots.len());

        if let Some(reason) = state.enumerate_failures.pop_front() {
            return Err(EnumerateError::Failed { reason });
        }
        if state.wedged_enumerations > 0 {
            state.wedged_enumerations -= 1;
            return Err(EnumerateError::BufferTooSmall {
                required: state.wedged_required,
            });
        }

        let count = state.current.len();
        if slots.len() < count {
            return Err(EnumerateError::BufferTooSmall { required: count });
        }

        for (slot, spec) in slots.iter_mut().zip(&state.current) {
            *slot = Some(SimRow::new(spec.cells.clone(), self.class.live_rows.clone()));
        }
        Ok(count)
    }
}

/// One enumerated row. Dropping it releases it (decrements the class's
/// live-row counter).
#[derive(Debug)]
pub struct SimRow {
    cells: BTreeMap<u64, SimCell>,
    live: Arc<AtomicUsize>,
}

impl SimRow {
    fn new(cells: BTreeMap<u64, SimCell>, live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self { cells, live }
    }
}

impl Drop for SimRow {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Row for SimRow {
    fn accessor(&self, property: &str) -> Result<PropertyAccessor, AccessError> {
        let handle = accessor_handle(property);
        let cell = self.cells.get(&handle).ok_or_else(|| AccessError::NoSuchProperty {
            property: property.to_owned(),
        })?;
        Ok(PropertyAccessor {
            tag: cell.tag,
            handle,
        })
    }

    fn read(&self, accessor: &PropertyAccessor, out: &mut [u8]) -> Result<usize, ReadError> {
        let cell = self.cells.get(&accessor.handle).ok_or_else(|| ReadError {
            reason: format!("unknown accessor handle {:#x}", accessor.handle),
        })?;
        if cell.fail_read {
            return Err(ReadError {
                reason: "scripted read failure".to_owned(),
            });
        }
        let copied = cell.bytes.len().min(out.len());
        out[..copied].copy_from_slice(&cell.bytes[..copied]);
        Ok(cell.bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use perfpoll_core::value::CounterValue;

    use super::*;

    fn one_row_locator() -> (SimLocator, SimClass) {
        let locator = SimLocator::new();
        let class = locator.add_class("Win32_PerfRawData_PerfOS_Processor");
        class.push_table(vec![SimRowSpec::new()
            .text("Name", "_Total")
            .uint64("PercentProcessorTime", 1234)]);
        (locator, class)
    }

    fn open(locator: &SimLocator) -> SimEnumerator {
        locator
            .connect("root/cimv2", None)
            .expect("connect")
            .open_enumerator("Win32_PerfRawData_PerfOS_Processor")
            .expect("open")
    }

    #[test]
    fn connect_rejects_unknown_namespace() {
        let (locator, _class) = one_row_locator();
        let err = locator.connect("root/other", None).unwrap_err();
        assert!(matches!(err, ConnectError::NamespaceUnavailable { .. }), "got: {err}");
    }

    #[test]
    fn connect_checks_credentials() {
        let locator = SimLocator::new().require_credentials(Credentials {
            username: "monitor".into(),
            password: "hunter2".into(),
        });
        let err = locator.connect("root/cimv2", None).unwrap_err();
        assert!(matches!(err, ConnectError::AuthenticationRejected { .. }), "got: {err}");
    }

    #[test]
    fn open_unknown_class_fails() {
        let (locator, _class) = one_row_locator();
        let connection = locator.connect("root/cimv2", None).expect("connect");
        let err = connection.open_enumerator("Win32_NoSuchClass").unwrap_err();
        assert!(matches!(err, SetupError::NoSuchClass { .. }), "got: {err}");
    }

    #[test]
    fn enumerate_reports_required_count_when_slots_short() {
        let (locator, class) = one_row_locator();
        class.push_table(vec![SimRowSpec::new(); 5]);
        let mut enumerator = open(&locator);
        enumerator.refresh().expect("refresh");
        enumerator.refresh().expect("refresh"); // serve the 5-row table

        let mut slots: Vec<Option<SimRow>> = Vec::new();
        slots.resize_with(2, || None);
        let err = enumerator.enumerate(&mut slots).unwrap_err();
        assert!(
            matches!(err, EnumerateError::BufferTooSmall { required: 5 }),
            "got: {err}"
        );
    }

    #[test]
    fn rows_decode_and_release_on_drop() {
        let (locator, class) = one_row_locator();
        let mut enumerator = open(&locator);
        enumerator.refresh().expect("refresh");

        let mut slots: Vec<Option<SimRow>> = Vec::new();
        slots.resize_with(4, || None);
        let count = enumerator.enumerate(&mut slots).expect("enumerate");
        assert_eq!(count, 1);
        assert_eq!(class.live_rows(), 1);

        {
            let row = slots[0].as_ref().expect("row");
            let accessor = row.accessor("PercentProcessorTime").expect("accessor");
            assert_eq!(accessor.tag, TypeTag::Uint64);

            let mut scratch = [0u8; 8];
            let len = row.read(&accessor, &mut scratch).expect("read");
            assert_eq!(len, 8);
            assert_eq!(
                CounterValue::decode(accessor.tag, &scratch).expect("decode"),
                CounterValue::Uint64(1234)
            );
        }

        slots.iter_mut().for_each(|slot| *slot = None);
        assert_eq!(class.live_rows(), 0);
    }

    #[test]
    fn zero_capacity_read_probes_text_length() {
        let (locator, _class) = one_row_locator();
        let mut enumerator = open(&locator);
        enumerator.refresh().expect("refresh");

        let mut slots: Vec<Option<SimRow>> = Vec::new();
        slots.resize_with(1, || None);
        enumerator.enumerate(&mut slots).expect("enumerate");
        let row = slots[0].as_ref().expect("row");

        let accessor = row.accessor("Name").expect("accessor");
        let required = row.read(&accessor, &mut []).expect("probe");
        assert_eq!(required, "_Total".len());

        let mut exact = vec![0u8; required];
        let len = row.read(&accessor, &mut exact).expect("read");
        assert_eq!(len, required);
        assert_eq!(
            CounterValue::decode(accessor.tag, &exact).expect("decode"),
            CounterValue::Text("_Total".into())
        );
    }

    #[test]
    fn scripted_failures_fire_in_order() {
        let (locator, class) = one_row_locator();
        class.fail_next_refresh("source offline");
        let mut enumerator = open(&locator);

        let err = enumerator.refresh().unwrap_err();
        assert!(err.to_string().contains("source offline"));
        enumerator.refresh().expect("second refresh succeeds");

        class.wedge_enumeration(1, 50);
        let mut slots: Vec<Option<SimRow>> = Vec::new();
        slots.resize_with(8, || None);
        let err = enumerator.enumerate(&mut slots).unwrap_err();
        assert!(
            matches!(err, EnumerateError::BufferTooSmall { required: 50 }),
            "got: {err}"
        );
        assert_eq!(enumerator.enumerate(&mut slots).expect("enumerate"), 1);
    }

    #[test]
    fn accessor_for_missing_property_fails() {
        let (locator, _class) = one_row_locator();
        let mut enumerator = open(&locator);
        enumerator.refresh().expect("refresh");
        let mut slots: Vec<Option<SimRow>> = Vec::new();
        slots.resize_with(1, || None);
        enumerator.enumerate(&mut slots).expect("enumerate");

        let row = slots[0].as_ref().expect("row");
        let err = row.accessor("FrequencyPerfTime").unwrap_err();
        assert!(matches!(err, AccessError::NoSuchProperty { .. }), "got: {err}");
    }
}
