//! # SmartStore Core
//!
//! Pure types for the SmartStore client: store identity, soup and index
//! specifications, and soup entry helpers.
//!
//! This crate contains no I/O. Everything here is validated at construction,
//! so engines and the client can rely on well-formed names and specs.
//!
//! ## Key Types
//!
//! - [`StoreKey`] - (name, scope) pair addressing a store
//! - [`StoreScope`] - `Global` or per-[`UserId`]
//! - [`IndexSpec`] / [`IndexType`] - typed index declarations
//! - [`SoupSpec`] - soup name and features

pub mod entry;
pub mod error;
pub mod soup;
pub mod types;

pub use entry::{SoupEntryId, SOUP_ENTRY_ID, SOUP_LAST_MODIFIED_DATE};
pub use error::SpecError;
pub use soup::{validate_index_specs, validate_soup_name, IndexSpec, IndexType, SoupFeature, SoupSpec};
pub use types::{StoreKey, StoreName, StoreScope, UserId};
