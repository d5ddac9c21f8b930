//! Error types for SmartStore core types.

use thiserror::Error;

/// Errors raised while constructing or parsing store, soup and index specs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    /// Store name is unusable (empty, path separators, reserved names).
    #[error("invalid store name {name:?}: {reason}")]
    InvalidStoreName { name: String, reason: &'static str },

    /// Soup name is empty.
    #[error("soup name must not be empty")]
    EmptySoupName,

    /// Index spec path is empty.
    #[error("index spec path must not be empty")]
    EmptyIndexPath,

    /// Index type is not one of the supported types.
    #[error("unrecognized index type: {0:?}")]
    UnknownIndexType(String),

    /// No index specs were supplied for a soup.
    #[error("at least one index spec is required")]
    NoIndexSpecs,

    /// Index spec dictionary is malformed.
    #[error("malformed index spec: {0}")]
    MalformedIndexSpec(String),

    /// Soup feature is not supported.
    #[error("unrecognized soup feature: {0:?}")]
    UnknownFeature(String),
}

/// Result type for spec construction.
pub type Result<T> = std::result::Result<T, SpecError>;
