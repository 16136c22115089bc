//! # perfpoll-provider
//!
//! The provider contract consumed by the poll engine, plus a deterministic
//! in-memory implementation.
//!
//! A provider is a refreshable, column-oriented performance data source
//! (the archetype is a WMI high-performance counter class). The engine
//! drives it through the [`Locator`] → [`Connection`] → [`Enumerator`] →
//! [`Row`] trait family and never sees a concrete backend.

pub mod error;
pub mod sim;
pub mod source;

pub use error::{
    AccessError, ConnectError, EnumerateError, ReadError, RefreshError, SetupError,
};
pub use source::{AccessorHandle, Connection, Enumerator, Locator, PropertyAccessor, Row};
