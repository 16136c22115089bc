//! # perfpoll-engine
//!
//! The polling engine: dynamic enumeration buffer management, the typed
//! property read path, and the poll scheduler with synchronous and
//! asynchronous sessions.
//!
//! Build a [`Poller`] with [`Poller::connect`], bind properties, then run
//! [`Poller::query`] (collect), [`Poller::query_callback`] (stream), or
//! [`Poller::query_blocking`] from non-async callers.

pub mod buffer;
pub mod error;
pub mod read;
pub mod session;

pub use buffer::{EnumBuffer, RowBatch};
pub use error::PollError;
pub use session::{Poller, SessionEnd};
