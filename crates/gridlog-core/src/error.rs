//! Error types for gridlog-core

use thiserror::Error;

/// Result type alias using gridlog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in gridlog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote call failure (offline, timeout, server error) - retryable
    #[error("Network error: {0}")]
    Network(String),

    /// Blob/object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Persisted photo content cannot be re-materialized - never retried
    #[error("Corrupt content: {0}")]
    CorruptContent(String),
}

impl Error {
    /// Whether this error is a transient remote failure worth retrying
    /// on the next drain pass.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::Network("offline".to_string()).is_transient());
        assert!(Error::Storage("put failed".to_string()).is_transient());
        assert!(!Error::CorruptContent("empty".to_string()).is_transient());
        assert!(!Error::InvalidInput("bad".to_string()).is_transient());
    }
}
