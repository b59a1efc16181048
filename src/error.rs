//! Error types for the instrument layer

use thiserror::Error;

use crate::layer::ContextId;

/// Malformed wire geometry. Decoding fails fast and never returns a
/// partially decoded shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("malformed geometry: unrecognized byte order flag {0}")]
    ByteOrder(u8),

    #[error("malformed geometry: unknown type tag {0}")]
    UnknownType(i32),

    #[error("malformed geometry: type tag {0} is a multi-geometry and is not supported")]
    UnsupportedType(i32),

    #[error("malformed geometry: expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("malformed geometry: negative {what} count {count}")]
    NegativeCount { what: &'static str, count: i32 },

    #[error("malformed geometry: needed {needed} more bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },
}

/// Failure reported by a record data source
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("data source unavailable: {0}")]
    Unavailable(String),

    #[error("data source error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Errors raised by views, contexts and the selection fetch worker
#[derive(Debug, Error)]
pub enum LayerError {
    /// A fetch was requested while another one is in flight on the same view
    #[error("fetch rejected: a fetch is already in flight for this view")]
    RejectedFetch,

    #[error("unknown context {0}")]
    UnknownContext(ContextId),

    #[error("no active context")]
    NoActiveContext,

    #[error(transparent)]
    MalformedGeometry(#[from] GeometryError),

    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    #[error("failed to spawn fetch worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
