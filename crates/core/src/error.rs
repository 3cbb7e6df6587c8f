//! Unified error types for pwa-cache.
//!
//! Display strings carry an upper-case code prefix so log lines can be
//! grouped without parsing the message.

use tokio_rusqlite::rusqlite;

/// Unified error types for the caching agent and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty method).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be resolved into a fetchable request.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network request failed before a response was produced.
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// One or more precache manifest entries could not be added.
    #[error("PRECACHE_FAILED: {0}")]
    PrecacheFailed(String),

    /// One or more stale cache stores could not be deleted.
    #[error("STALE_DELETION: {0}")]
    StaleDeletion(String),

    /// Named cache store does not exist.
    #[error("CACHE_ERROR: no cache store named {0}")]
    StoreNotFound(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// No handler registered for a dispatched signal.
    #[error("NO_HANDLER: {0}")]
    NoHandler(String),

    /// Handler task panicked or was aborted.
    #[error("TASK_FAILED: {0}")]
    TaskFailed(String),

    /// Filesystem or stdio failure.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// Lifecycle transition not allowed from the current state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::StoreNotFound("bcv-converter-cache-v1".to_string());
        assert!(err.to_string().contains("CACHE_ERROR"));
        assert!(err.to_string().contains("bcv-converter-cache-v1"));
    }

    #[test]
    fn test_error_codes() {
        assert!(Error::Network("dns".into()).to_string().starts_with("NETWORK_ERROR"));
        assert!(Error::PrecacheFailed("x".into()).to_string().starts_with("PRECACHE_FAILED"));
        assert!(Error::StaleDeletion("x".into()).to_string().starts_with("STALE_DELETION"));
    }

    #[test]
    fn test_rusqlite_conversion() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Database(_)));
    }
}
