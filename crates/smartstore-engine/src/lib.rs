//! # SmartStore Engine
//!
//! Storage engine interface for the SmartStore client. Provides a trait-based
//! interface for store and soup persistence with SQLite and in-memory
//! implementations.
//!
//! ## Overview
//!
//! The client reaches storage only through the [`Engine`] trait, which keeps it
//! storage-agnostic. The persistent implementation is [`SqliteEngine`] (one
//! SQLite file per store), with [`MemoryEngine`] for testing.
//!
//! ## Key Types
//!
//! - [`Engine`] - The async trait for all storage operations
//! - [`EngineExt`] - Scope-specific open/delete helpers
//! - [`SqliteEngine`] / [`SqliteEngineConfig`] - SQLite-based persistent storage
//! - [`MemoryEngine`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use smartstore_core::{IndexSpec, SoupSpec, StoreName};
//! use smartstore_engine::{Engine, EngineExt, SqliteEngine};
//!
//! async fn example() {
//!     let engine = SqliteEngine::open("stores");
//!     let name = StoreName::new("cookbook").unwrap();
//!     let handle = engine.open_global_store(name).await.unwrap();
//!
//!     let spec = SoupSpec::new("recipes").unwrap();
//!     let indices = vec![IndexSpec::string("key").unwrap()];
//!     let created = engine.register_soup(&handle, &spec, &indices).await.unwrap();
//!     assert!(created);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One file per store**: deleting a store deletes its file
//! - **Atomic soup removal**: a soup and its entries go in one transaction
//! - **Ordered index specs**: returned exactly as registered

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{EngineError, Result};
pub use memory::{MemoryEngine, MemoryHandle};
pub use sqlite::{SqliteEngine, SqliteEngineConfig, SqliteHandle};
pub use traits::{Engine, EngineExt};

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
