use std::path::PathBuf;

/// Errors raised by a durable commit sink.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    /// I/O error from the underlying storage.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The entry set could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A persisted snapshot failed its integrity checks.
    #[error("corrupt snapshot {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// The sink refused the commit.
    #[error("commit rejected: {0}")]
    Rejected(String),
}

/// Result alias for sink operations.
pub type CommitResult<T> = Result<T, CommitError>;

/// Errors from committed map operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The caller passed an input the map cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The durable commit failed. The in-memory change was rolled back.
    #[error("commit failed: {0}")]
    Commit(#[from] CommitError),

    /// The store configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
