//! The provider trait family.
//!
//! Lifecycle: [`Locator::connect`] and [`Connection::open_enumerator`] run
//! once, before any cycle; their failures are fatal. Everything else runs
//! once per cycle and is transient.
//!
//! Row release is ownership-based: dropping a [`Row`] releases it. The
//! engine keeps each cycle's rows in a scope that ends before the next
//! enumeration, so release happens on every exit path without explicit
//! calls.

use perfpoll_core::config::Credentials;
use perfpoll_core::value::TypeTag;

use crate::error::{
    AccessError, ConnectError, EnumerateError, ReadError, RefreshError, SetupError,
};

/// Provider-issued opaque key for one property on one class.
pub type AccessorHandle = u64;

/// A resolved property accessor: the reported type plus the provider's key.
///
/// Valid for the rows of the enumeration it was resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyAccessor {
    pub tag: TypeTag,
    pub handle: AccessorHandle,
}

/// Entry point to a provider: negotiates namespace and credentials.
pub trait Locator {
    type Connection: Connection;

    fn connect(
        &self,
        namespace: &str,
        credentials: Option<&Credentials>,
    ) -> Result<Self::Connection, ConnectError>;
}

/// An authenticated namespace connection.
pub trait Connection {
    type Enumerator: Enumerator;

    fn open_enumerator(&self, class_name: &str) -> Result<Self::Enumerator, SetupError>;
}

/// A refreshable enumerator over one class's instances.
pub trait Enumerator {
    type Row: Row;

    /// Re-sample the underlying source. Called once at the top of each cycle.
    fn refresh(&mut self) -> Result<(), RefreshError>;

    /// Fill the front of `slots` with the current instances and return the
    /// row count. When `slots` is too short, fails with
    /// [`EnumerateError::BufferTooSmall`] carrying the required count and
    /// fills nothing.
    fn enumerate(&mut self, slots: &mut [Option<Self::Row>]) -> Result<usize, EnumerateError>;
}

/// One enumerated instance, valid until dropped (dropping releases it).
pub trait Row {
    /// Resolve the accessor for `property` on this row's class.
    fn accessor(&self, property: &str) -> Result<PropertyAccessor, AccessError>;

    /// Read the raw value behind `accessor` into `out`.
    ///
    /// Writes `min(value_len, out.len())` bytes and returns the value's full
    /// byte length, so a zero-capacity read probes the length of a
    /// variable-width value without copying.
    fn read(&self, accessor: &PropertyAccessor, out: &mut [u8]) -> Result<usize, ReadError>;
}
