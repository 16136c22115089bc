//! Error surface for the poll engine.

use thiserror::Error;

use perfpoll_core::error::{ConfigError, ValueError};
use perfpoll_provider::error::{ConnectError, SetupError};

/// All errors a [`crate::Poller`] can surface to the caller.
///
/// Per-cycle provider failures (refresh, enumerate past the one retry,
/// accessor lookup, reads) are never represented here; they degrade the
/// affected row, handle, or cycle and the session continues.
#[derive(Debug, Error)]
pub enum PollError {
    /// Connecting to the provider namespace failed. Fatal, before any cycle.
    #[error("provider connection failed: {0}")]
    Connect(#[from] ConnectError),

    /// Creating the class enumerator failed. Fatal, before any cycle.
    #[error("enumerator setup failed: {0}")]
    Setup(#[from] SetupError),

    /// The session was misconfigured; rejected at call time.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The provider violated the fixed-width value contract mid-session.
    #[error("provider contract violation: {0}")]
    Value(#[from] ValueError),

    /// A session is already running on this helper; the running session is
    /// unaffected.
    #[error("a poll session is already running on this helper")]
    SessionActive,

    /// The session task panicked; its enumerator is gone and the helper
    /// cannot start further sessions.
    #[error("poll session task failed: {0}")]
    SessionPanicked(String),

    /// A previous session task panicked and took the enumerator with it.
    #[error("helper lost its enumerator to a failed session task")]
    SessionLost,

    /// Building the blocking-mode runtime failed.
    #[error("failed to build poll runtime: {0}")]
    Runtime(#[source] std::io::Error),
}
