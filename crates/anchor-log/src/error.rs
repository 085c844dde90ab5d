use anchor_crypto::ChainError;
use anchor_store::StoreError;

/// Errors produced by the event log.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The durable log file could not be read or written.
    #[error("log storage error: {0}")]
    Storage(#[from] StoreError),

    /// The in-memory log state is unusable (poisoned lock).
    #[error("event log unavailable: {0}")]
    Unavailable(String),

    /// Sequence numbers are not contiguous.
    #[error("sequence gap: expected {expected}, found {found}")]
    SequenceGap { expected: u64, found: u64 },

    /// The hash chain does not verify.
    #[error("audit chain broken: {0}")]
    Chain(#[from] ChainError),

    /// The same hash appears in more than one event.
    #[error("hash {hash} logged twice (sequences {first} and {second})")]
    DuplicateHash {
        hash: String,
        first: u64,
        second: u64,
    },

    /// The subscription's source log has gone away.
    #[error("subscription closed")]
    SubscriptionClosed,
}

/// Convenience alias used throughout the log crate.
pub type LogResult<T> = std::result::Result<T, LogError>;
