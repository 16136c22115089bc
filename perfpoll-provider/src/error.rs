//! Error surface for the provider contract.
//!
//! Setup failures ([`ConnectError`], [`SetupError`]) are fatal to the
//! caller; the per-cycle failures ([`RefreshError`], [`EnumerateError`],
//! [`AccessError`], [`ReadError`]) are transient and recovered locally by
//! the engine.

use thiserror::Error;

/// Connecting to the provider namespace failed. Fatal; no session starts.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("namespace {namespace} not available: {reason}")]
    NamespaceUnavailable { namespace: String, reason: String },

    #[error("authentication rejected for {namespace}")]
    AuthenticationRejected { namespace: String },
}

/// Creating the class enumerator failed. Fatal; no session starts.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("class {class_name} not found in namespace")]
    NoSuchClass { class_name: String },

    #[error("enumerator creation failed for {class_name}: {reason}")]
    EnumeratorUnavailable { class_name: String, reason: String },
}

/// A per-cycle refresh failed; the cycle degrades to an empty result.
#[derive(Debug, Error)]
#[error("provider refresh failed: {reason}")]
pub struct RefreshError {
    pub reason: String,
}

/// A per-cycle enumeration failed.
#[derive(Debug, Error)]
pub enum EnumerateError {
    /// The supplied slot buffer cannot hold the result set. The engine
    /// grows its buffer to exactly `required` and retries once.
    #[error("enumeration buffer too small: {required} rows required")]
    BufferTooSmall { required: usize },

    #[error("enumeration failed: {reason}")]
    Failed { reason: String },
}

/// Resolving a property accessor failed; the whole handle is skipped for
/// the cycle.
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("no such property: {property}")]
    NoSuchProperty { property: String },
}

/// Reading one row's value failed; that row is skipped for that handle.
#[derive(Debug, Error)]
#[error("property read failed: {reason}")]
pub struct ReadError {
    pub reason: String,
}
