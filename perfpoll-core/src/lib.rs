//! Perfpoll core library — domain types, binding registry, snapshot store,
//! configuration, errors.
//!
//! Public API surface:
//! - [`types`] — handles, columns, [`types::Snapshot`]
//! - [`value`] — [`value::TypeTag`], [`value::CounterValue`], raw decode
//! - [`bindings`] — [`bindings::BindingRegistry`]
//! - [`snapshot`] — [`snapshot::SnapshotStore`]
//! - [`config`] — [`config::PollConfig`]
//! - [`error`] — [`ConfigError`], [`ValueError`]

pub mod bindings;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod types;
pub mod value;

pub use bindings::BindingRegistry;
pub use config::{Credentials, PollConfig, Termination};
pub use error::{ConfigError, ValueError};
pub use snapshot::SnapshotStore;
pub use types::{Column, ColumnMap, PropertyHandle, PropertyName, Snapshot};
pub use value::{CounterValue, TypeTag, FIXED_VALUE_CAPACITY};
