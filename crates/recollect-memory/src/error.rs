//! Error types for memory operations.

use recollect_protocol::GenerationError;

/// Errors returned by persistence gateways.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// SQLite driver error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// IO error while preparing the database location.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A row did not have the expected shape.
    #[error("unexpected row shape: {0}")]
    Decode(String),
    /// Store is unreachable or refused the statement.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by memory components and their helpers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Relational store failure.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    /// Generation backend failure.
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization error.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Similarity index failure.
    #[error("similarity index error: {0}")]
    Similarity(String),
    /// Operation needs a user row that does not exist.
    #[error("no user found")]
    MissingUser,
}
