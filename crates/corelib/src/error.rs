//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
///
/// Every variant is surfaced synchronously to the caller of the operation that
/// triggered it; nothing is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Missing key or value, duplicate or unknown node, bad replica count.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    /// The ring has no members to serve a lookup.
    #[error("Unavailable: {0}")]
    Unavailable(String),
    /// Digest or key serialization failure.
    #[error("Hashing failed: {0}")]
    Hashing(String),
    /// Defect such as a node used before its backend was attached.
    #[error("Internal error: {0}")]
    Internal(String),
    /// Operation not offered at this level (cluster-wide evict/list).
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// Failure reported by a backend connector.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}
