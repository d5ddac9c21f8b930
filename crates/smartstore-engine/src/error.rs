//! Error types for the engine module.

use smartstore_core::{SpecError, StoreKey};
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage for a store could not be allocated or opened.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// No store exists for the key.
    #[error("store not found: {0}")]
    StoreNotFound(StoreKey),

    /// No soup with this name exists in the store.
    #[error("soup not found: {0}")]
    SoupNotFound(String),

    /// An entry could not be stored (not an object, unknown entry id).
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CBOR encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored data could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Spec rejected by the engine.
    #[error("invalid spec: {0}")]
    Spec(#[from] SpecError),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// A blocking task failed or a lock was poisoned.
    #[error("engine task failed: {0}")]
    Task(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// An external-id value matched several stored entries.
    pub(crate) fn ambiguous_match(soup: &str, path: &str, value: &serde_json::Value) -> Self {
        EngineError::InvalidEntry(format!(
            "more than one entry in soup {soup} where {path} = {value}"
        ))
    }

    /// A lookup path that the soup was not registered with.
    pub(crate) fn not_indexed(soup: &str, path: &str) -> Self {
        EngineError::InvalidEntry(format!("{path} is not an indexed path of soup {soup}"))
    }
}
