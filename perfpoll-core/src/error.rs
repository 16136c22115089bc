//! Error types for perfpoll-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::value::TypeTag;

/// Errors from decoding raw provider bytes into [`crate::CounterValue`]s.
#[derive(Debug, Error)]
pub enum ValueError {
    /// A fixed-width value was reported longer than the scratch capacity —
    /// a provider contract violation, never silently truncated.
    #[error(
        "fixed-width {tag} value of {len} bytes exceeds the {capacity}-byte scratch capacity"
    )]
    Oversized {
        tag: TypeTag,
        len: usize,
        capacity: usize,
    },

    /// The provider returned fewer bytes than the tag's encoded width.
    #[error("{tag} value needs {expected} bytes, provider returned {actual}")]
    Short {
        tag: TypeTag,
        expected: usize,
        actual: usize,
    },

    /// A text value was not valid UTF-8.
    #[error("text value is not valid UTF-8: {0}")]
    Utf8(#[source] std::str::Utf8Error),
}

/// Errors from building or loading a poll configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure reading a config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load — includes file path and line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A synchronous query was requested with no finite termination bound;
    /// it could never return and is rejected before any cycle runs.
    #[error("synchronous query requires a finite fire-count or elapsed-time bound")]
    UnboundedSyncQuery,
}
