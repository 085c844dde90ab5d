use std::path::PathBuf;

use anchor_crypto::FingerprintError;
use anchor_log::LogError;
use anchor_store::StoreError;
use anchor_types::{AnchorHash, TypeError};
use thiserror::Error;

/// Failures of the public anchor operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed hash or submitter. Rejected before any storage access;
    /// retrying the same input cannot succeed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The durable medium could not be read or written.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The record for `hash` was committed but its event was not logged.
    /// Retrying the same anchor call, or running reconciliation, repairs it.
    #[error("inconsistent state for {hash}: {reason}")]
    Inconsistent { hash: AnchorHash, reason: String },
}

/// Coarse classification of a [`ServiceError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidInput,
    StorageUnavailable,
    Inconsistent,
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::StorageUnavailable(_) => ErrorKind::StorageUnavailable,
            Self::Inconsistent { .. } => ErrorKind::Inconsistent,
        }
    }

    /// Whether the same call may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::InvalidInput)
    }

    pub(crate) fn inconsistent(hash: AnchorHash, reason: impl Into<String>) -> Self {
        Self::Inconsistent {
            hash,
            reason: reason.into(),
        }
    }
}

impl From<TypeError> for ServiceError {
    fn from(e: TypeError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<FingerprintError> for ServiceError {
    fn from(e: FingerprintError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl From<LogError> for ServiceError {
    fn from(e: LogError) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}

impl From<ConfigError> for ServiceError {
    fn from(e: ConfigError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

/// Errors loading or validating a [`RegistryConfig`](crate::RegistryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
