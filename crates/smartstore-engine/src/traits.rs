//! Engine trait: the interface to the storage engine.
//!
//! The client never touches storage directly. Everything it needs from the
//! engine goes through this trait, so engines can be swapped (SQLite for
//! applications, in-memory for tests).

use async_trait::async_trait;
use serde_json::Value;

use smartstore_core::{IndexSpec, SoupEntryId, SoupSpec, StoreKey, StoreName, StoreScope, UserId};

use crate::error::Result;

/// The Engine trait: async interface to store and soup storage.
///
/// All methods are async; engines backed by blocking libraries move the
/// work off the runtime (SQLite uses `spawn_blocking`).
///
/// # Design Notes
///
/// - **Handles**: `open_store` returns an engine handle that stays usable
///   until the store is deleted. The client layer adds its own validity
///   tracking on top.
/// - **No conflict policy**: `register_soup` reports whether the soup was
///   created; deciding what a second registration means is up to the caller.
/// - **Atomic removal**: `remove_soup` drops the soup and its entries in one
///   step and reports whether anything was removed.
#[async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Handle to an open store.
    type Handle: Clone + Send + Sync + 'static;

    // ─────────────────────────────────────────────────────────────────────────
    // Store Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Open a store, creating it if it does not exist.
    ///
    /// Fails with `Unavailable` if storage cannot be allocated.
    async fn open_store(&self, key: &StoreKey) -> Result<Self::Handle>;

    /// Delete a store and everything in it.
    ///
    /// Fails with `StoreNotFound` if the store does not exist.
    async fn delete_store(&self, key: &StoreKey) -> Result<()>;

    /// Check whether a store exists.
    async fn store_exists(&self, key: &StoreKey) -> Result<bool>;

    /// Names of all stores in a scope, sorted.
    async fn store_names(&self, scope: &StoreScope) -> Result<Vec<StoreName>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Soup Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Check whether a soup exists.
    async fn soup_exists(&self, handle: &Self::Handle, soup: &str) -> Result<bool>;

    /// Register a soup with its index specs.
    ///
    /// # Returns
    /// - `true` if the soup was created.
    /// - `false` if a soup with this name already exists (left unchanged).
    async fn register_soup(
        &self,
        handle: &Self::Handle,
        spec: &SoupSpec,
        indices: &[IndexSpec],
    ) -> Result<bool>;

    /// Remove a soup and all its entries.
    ///
    /// Returns `false` if the soup did not exist.
    async fn remove_soup(&self, handle: &Self::Handle, soup: &str) -> Result<bool>;

    /// Names of all soups in the store, sorted.
    async fn soup_names(&self, handle: &Self::Handle) -> Result<Vec<String>>;

    /// The index specs a soup was registered with, in registration order.
    async fn soup_indices(&self, handle: &Self::Handle, soup: &str)
        -> Result<Option<Vec<IndexSpec>>>;

    /// The attributes a soup was registered with.
    async fn soup_spec(&self, handle: &Self::Handle, soup: &str) -> Result<Option<SoupSpec>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entry Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete every entry in a soup, keeping the soup.
    async fn clear_soup(&self, handle: &Self::Handle, soup: &str) -> Result<()>;

    /// Insert or update entries.
    ///
    /// Entries without `_soupEntryId` are inserted; entries with one replace
    /// the stored entry. The batch is all-or-nothing. Returns the stored
    /// entries with system fields set.
    async fn upsert_entries(
        &self,
        handle: &Self::Handle,
        soup: &str,
        entries: Vec<Value>,
    ) -> Result<Vec<Value>>;

    /// Insert or update entries, matching stored entries by the value at
    /// `external_id_path` instead of by `_soupEntryId`.
    ///
    /// The path must be one of the soup's index paths (or `_soupEntryId`).
    /// Entries with no value at the path, or with no stored match, are
    /// inserted. A value matching more than one stored entry fails the batch.
    async fn upsert_entries_with_external_id(
        &self,
        handle: &Self::Handle,
        soup: &str,
        entries: Vec<Value>,
        external_id_path: &str,
    ) -> Result<Vec<Value>>;

    /// The id of the entry whose value at `path` equals `value`.
    ///
    /// `None` if no entry matches; fails if several do.
    async fn lookup_entry_id(
        &self,
        handle: &Self::Handle,
        soup: &str,
        path: &str,
        value: &Value,
    ) -> Result<Option<SoupEntryId>>;

    /// Fetch entries by id, in request order, skipping unknown ids.
    async fn retrieve_entries(
        &self,
        handle: &Self::Handle,
        soup: &str,
        ids: &[SoupEntryId],
    ) -> Result<Vec<Value>>;

    /// Delete entries by id. Unknown ids are ignored.
    async fn remove_entries(
        &self,
        handle: &Self::Handle,
        soup: &str,
        ids: &[SoupEntryId],
    ) -> Result<()>;

    /// Number of entries in a soup.
    async fn entry_count(&self, handle: &Self::Handle, soup: &str) -> Result<u64>;
}

/// Extension trait naming the scope-specific store operations.
pub trait EngineExt: Engine {
    /// Open (or create) a global store.
    fn open_global_store(
        &self,
        name: StoreName,
    ) -> impl std::future::Future<Output = Result<Self::Handle>> + Send;

    /// Open (or create) a store for a user.
    fn open_shared_store(
        &self,
        name: StoreName,
        user: UserId,
    ) -> impl std::future::Future<Output = Result<Self::Handle>> + Send;

    /// Delete a global store.
    fn delete_global_store(
        &self,
        name: StoreName,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Delete a user's store.
    fn delete_shared_store(
        &self,
        name: StoreName,
        user: UserId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

impl<E: Engine + ?Sized> EngineExt for E {
    async fn open_global_store(&self, name: StoreName) -> Result<Self::Handle> {
        self.open_store(&StoreKey::global(name)).await
    }

    async fn open_shared_store(&self, name: StoreName, user: UserId) -> Result<Self::Handle> {
        self.open_store(&StoreKey::user(name, user)).await
    }

    async fn delete_global_store(&self, name: StoreName) -> Result<()> {
        self.delete_store(&StoreKey::global(name)).await
    }

    async fn delete_shared_store(&self, name: StoreName, user: UserId) -> Result<()> {
        self.delete_store(&StoreKey::user(name, user)).await
    }
}
