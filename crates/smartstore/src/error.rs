//! Error types for the client.
//!
//! Every failure maps to exactly one [`ErrorKind`] so callers can branch on
//! the failure class. Errors coming out of a promise are wrapped in an
//! [`OperationError`] naming the operation that failed.

use std::fmt;

use smartstore_core::{SpecError, StoreKey};
use smartstore_engine::EngineError;
use thiserror::Error;

/// Failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Storage could not be allocated or opened.
    StoreUnavailable,
    /// No store exists for the (name, scope).
    StoreNotFound,
    /// The handle's store was removed or closed.
    HandleInvalidated,
    /// Underlying I/O or database failure.
    StoreIo,
    /// Index specs (or the soup name) are invalid.
    InvalidIndexSpec,
    /// A soup with different index specs already exists.
    SoupAlreadyExists,
    /// No soup with the name exists.
    SoupNotFound,
}

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage could not be allocated or opened.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// No store exists for the key.
    #[error("store not found: {0}")]
    StoreNotFound(StoreKey),

    /// The handle's store was removed or closed.
    #[error("store handle invalidated: {0}")]
    HandleInvalidated(StoreKey),

    /// Engine failure (database, filesystem, encoding).
    #[error("store I/O error: {0}")]
    Io(#[source] EngineError),

    /// Index specs or soup name rejected.
    #[error("invalid index spec: {0}")]
    InvalidIndexSpec(#[source] SpecError),

    /// A soup with different index specs is registered under this name.
    #[error("soup {0} already exists with different index specs")]
    SoupAlreadyExists(String),

    /// Soup not found.
    #[error("soup not found: {0}")]
    SoupNotFound(String),

    /// Entry could not be stored.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),
}

impl StoreError {
    /// The failure class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            StoreError::StoreNotFound(_) => ErrorKind::StoreNotFound,
            StoreError::HandleInvalidated(_) => ErrorKind::HandleInvalidated,
            StoreError::Io(_) | StoreError::InvalidEntry(_) => ErrorKind::StoreIo,
            StoreError::InvalidIndexSpec(_) => ErrorKind::InvalidIndexSpec,
            StoreError::SoupAlreadyExists(_) => ErrorKind::SoupAlreadyExists,
            StoreError::SoupNotFound(_) => ErrorKind::SoupNotFound,
        }
    }
}

impl From<SpecError> for StoreError {
    fn from(e: SpecError) -> Self {
        match e {
            SpecError::InvalidStoreName { .. } => StoreError::StoreUnavailable(e.to_string()),
            other => StoreError::InvalidIndexSpec(other),
        }
    }
}

impl From<EngineError> for StoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Unavailable(msg) => StoreError::StoreUnavailable(msg),
            EngineError::StoreNotFound(key) => StoreError::StoreNotFound(key),
            EngineError::SoupNotFound(soup) => StoreError::SoupNotFound(soup),
            EngineError::InvalidEntry(msg) => StoreError::InvalidEntry(msg),
            EngineError::Spec(spec) => StoreError::from(spec),
            other => StoreError::Io(other),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Operations exposed through the promise facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    OpenStore,
    RemoveStore,
    RemoveAllStores,
    StoreNames,
    SoupExists,
    RegisterSoup,
    RemoveSoup,
    RemoveAllSoups,
    SoupNames,
    SoupIndices,
    SoupSpec,
    ClearSoup,
    UpsertEntries,
    LookupEntryId,
    RetrieveEntries,
    RemoveEntries,
    EntryCount,
    /// A promise composed from other promises.
    Chain,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::OpenStore => "open_store",
            Operation::RemoveStore => "remove_store",
            Operation::RemoveAllStores => "remove_all_stores",
            Operation::StoreNames => "store_names",
            Operation::SoupExists => "soup_exists",
            Operation::RegisterSoup => "register_soup",
            Operation::RemoveSoup => "remove_soup",
            Operation::RemoveAllSoups => "remove_all_soups",
            Operation::SoupNames => "soup_names",
            Operation::SoupIndices => "soup_indices",
            Operation::SoupSpec => "soup_spec",
            Operation::ClearSoup => "clear_soup",
            Operation::UpsertEntries => "upsert_entries",
            Operation::LookupEntryId => "lookup_entry_id",
            Operation::RetrieveEntries => "retrieve_entries",
            Operation::RemoveEntries => "remove_entries",
            Operation::EntryCount => "entry_count",
            Operation::Chain => "chain",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected operation: what failed and why.
#[derive(Debug, Error)]
#[error("{operation} failed: {error}")]
pub struct OperationError {
    pub operation: Operation,
    #[source]
    pub error: StoreError,
}

impl OperationError {
    pub fn new(operation: Operation, error: StoreError) -> Self {
        Self { operation, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smartstore_core::StoreName;

    #[test]
    fn test_engine_errors_keep_meaning() {
        let key = StoreKey::global(StoreName::new("G1").unwrap());

        let cases = [
            (EngineError::Unavailable("disk full".into()), ErrorKind::StoreUnavailable),
            (EngineError::StoreNotFound(key), ErrorKind::StoreNotFound),
            (EngineError::SoupNotFound("S".into()), ErrorKind::SoupNotFound),
            (EngineError::InvalidEntry("x".into()), ErrorKind::StoreIo),
            (EngineError::Task("poisoned".into()), ErrorKind::StoreIo),
            (
                EngineError::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
                ErrorKind::StoreIo,
            ),
            (EngineError::Spec(SpecError::EmptyIndexPath), ErrorKind::InvalidIndexSpec),
        ];

        for (engine_err, kind) in cases {
            assert_eq!(StoreError::from(engine_err).kind(), kind);
        }
    }

    #[test]
    fn test_invalid_store_name_is_unavailable() {
        let err: StoreError = StoreName::new("a/b").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }

    #[test]
    fn test_operation_error_display() {
        let err = OperationError::new(
            Operation::RemoveSoup,
            StoreError::SoupNotFound("WONTONSOUP".into()),
        );
        assert_eq!(err.to_string(), "remove_soup failed: soup not found: WONTONSOUP");
        assert_eq!(err.kind(), ErrorKind::SoupNotFound);
    }
}
