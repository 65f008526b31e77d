//! Error taxonomy surfaced by provider operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown address {0}")]
    UnrecognizedAddress(String),

    #[error("Initial values must contain {field}")]
    MissingRequiredField { field: &'static str },

    #[error("Failed to write row into {address}: {reason}")]
    WriteFailure { address: String, reason: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid column {column} for {relation}")]
    InvalidColumn {
        relation: &'static str,
        column: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid mode for opening file: {0}. Only 'r' is valid")]
    UnsupportedMode(String),

    #[error("Provider connection lock is poisoned")]
    Poisoned,

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Preference store error: {0:#}")]
    Preferences(anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProviderError {
    pub(crate) fn write_failure(address: impl ToString, reason: impl ToString) -> Self {
        ProviderError::WriteFailure {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Maps constraint violations raised while writing to `WriteFailure`, keeps
    /// every other storage error as is.
    pub(crate) fn from_write(address: impl ToString, err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::write_failure(address, msg.unwrap_or_else(|| e.to_string()))
            }
            other => ProviderError::Storage(other),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
