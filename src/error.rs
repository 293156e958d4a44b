//! Error types for the storage system
//!
//! `StoreError` covers the key-value backend, `StorageError` everything the
//! storage module can report to its caller.

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure inside a key-value backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backing file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected for key '{0}'")]
    WriteRejected(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage list is empty")]
    EmptyRegistry,

    #[error("Storage type '{0}' registered more than once")]
    DuplicateRecord(&'static str),

    #[error("Storage system has already been initialized")]
    AlreadyInitialized,

    #[error("Storage system has not been initialized")]
    NotInitialized,

    #[error("Storage type '{0}' not found")]
    RecordNotFound(String),

    #[error("Failed to encode storage: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to decode storage payload: {0}")]
    Decode(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<base64::DecodeError> for StorageError {
    fn from(err: base64::DecodeError) -> Self {
        StorageError::Decode(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for StorageError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        StorageError::Decode(err.to_string())
    }
}
