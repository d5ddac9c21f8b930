//! # SmartStore
//!
//! Promise-based client for SmartStore: named local stores that hold soups
//! (indexed collections of JSON entries).
//!
//! ## Overview
//!
//! The client provides:
//!
//! - **Store registry**: at most one live handle per (name, scope), with
//!   stale handles invalidated when a store is removed
//! - **Soup lifecycle**: register, query and remove soups inside a store
//! - **Async facade**: every operation returns a chainable [`Promise`]
//!
//! ## Key Concepts
//!
//! - **Store**: A named, persistent database, either global or per-user.
//! - **Soup**: A named collection inside a store, declared with index specs.
//! - **Handle**: A reference to an open store. Invalid once the store is removed.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use smartstore::{ClientConfig, SmartStoreClient};
//! use smartstore::core::{IndexSpec, UserId};
//! use smartstore::engine::SqliteEngine;
//!
//! async fn example() {
//!     let engine = SqliteEngine::open("stores");
//!     let config = ClientConfig::for_user(UserId::new("00D000", "005000"));
//!     let client = SmartStoreClient::new(engine, config);
//!
//!     let store = client.store("cookbook").await.unwrap();
//!     let indices = vec![IndexSpec::string("name").unwrap()];
//!     store.promises().register_soup("recipes", indices).await.unwrap();
//!
//!     let exists = store.promises().soup_exists("recipes").await.unwrap();
//!     assert!(exists);
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `smartstore::core` - Names, scopes, index and soup specs
//! - `smartstore::engine` - The storage engine trait and implementations

pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod promise;
pub mod registry;

// Re-export component crates
pub use smartstore_core as core;
pub use smartstore_engine as engine;

// Re-export main types for convenience
pub use client::{SmartStoreClient, StorePromises};
pub use config::ClientConfig;
pub use error::{ErrorKind, Operation, OperationError, Result, StoreError};
pub use handle::StoreHandle;
pub use promise::Promise;
pub use registry::StoreRegistry;

// Re-export commonly used core types
pub use smartstore_core::{
    IndexSpec, IndexType, SoupEntryId, SoupFeature, SoupSpec, StoreKey, StoreName, StoreScope,
    UserId,
};
