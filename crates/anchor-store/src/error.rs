use std::path::PathBuf;

/// Errors from anchor store operations.
///
/// Every variant means the durable medium could not be read or written
/// reliably; callers classify all of them as storage unavailability.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store cannot serve requests (poisoned lock, closed medium).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The storage directory or file could not be opened.
    #[error("storage path not usable: {}", .0.display())]
    BadPath(PathBuf),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn poisoned(what: &str) -> Self {
        Self::Unavailable(format!("{what} lock poisoned"))
    }
}
