//! The client: promise-returning store and soup operations.
//!
//! [`SmartStoreClient`] owns a [`StoreRegistry`] and exposes store lifecycle
//! operations as [`Promise`]s. Soup operations on an open store are reached
//! through [`StoreHandle::promises`].

use std::sync::Arc;

use serde_json::Value;

use smartstore_core::{
    IndexSpec, SoupEntryId, SoupSpec, StoreKey, StoreName, StoreScope, UserId,
};
use smartstore_engine::Engine;

use crate::config::ClientConfig;
use crate::error::{Operation, OperationError, Result, StoreError};
use crate::handle::StoreHandle;
use crate::promise::Promise;
use crate::registry::StoreRegistry;

/// The main client struct.
///
/// Provides a unified API for:
/// - Opening global and per-user stores
/// - Removing stores, one at a time or per scope
/// - Listing stores
///
/// Cloning is cheap; clones share the registry.
pub struct SmartStoreClient<E: Engine> {
    registry: Arc<StoreRegistry<E>>,
    config: ClientConfig,
}

impl<E: Engine> Clone for SmartStoreClient<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
        }
    }
}

impl<E: Engine> SmartStoreClient<E> {
    /// Create a client with its own registry over `engine`.
    pub fn new(engine: E, config: ClientConfig) -> Self {
        Self::with_registry(Arc::new(StoreRegistry::new(engine)), config)
    }

    /// Create a client over an existing registry.
    pub fn with_registry(registry: Arc<StoreRegistry<E>>, config: ClientConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<StoreRegistry<E>> {
        &self.registry
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn current_user(&self) -> Option<&UserId> {
        self.config.current_user.as_ref()
    }

    /// The current user's scope.
    fn user_scope(&self) -> Result<StoreScope> {
        self.config
            .current_user
            .clone()
            .map(StoreScope::User)
            .ok_or_else(|| StoreError::StoreUnavailable("no current user".to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Opening Stores
    // ─────────────────────────────────────────────────────────────────────────

    /// Open (or create) a store in any scope.
    pub fn open_store(&self, name: impl Into<String>, scope: StoreScope) -> Promise<StoreHandle<E>> {
        let registry = Arc::clone(&self.registry);
        let name = name.into();
        Promise::new(Operation::OpenStore, async move {
            let key = StoreKey::new(StoreName::new(name)?, scope);
            registry.open_or_create(&key).await
        })
    }

    /// Open (or create) a global store.
    pub fn global_store(&self, name: impl Into<String>) -> Promise<StoreHandle<E>> {
        self.open_store(name, StoreScope::Global)
    }

    /// Open (or create) a store for the current user.
    pub fn store(&self, name: impl Into<String>) -> Promise<StoreHandle<E>> {
        match self.user_scope() {
            Ok(scope) => self.open_store(name, scope),
            Err(error) => reject(Operation::OpenStore, error),
        }
    }

    /// Open (or create) a store for a specific user.
    pub fn store_for_user(&self, name: impl Into<String>, user: UserId) -> Promise<StoreHandle<E>> {
        self.open_store(name, StoreScope::User(user))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Removing Stores
    // ─────────────────────────────────────────────────────────────────────────

    /// Close and delete a store in any scope.
    pub fn remove_store(&self, name: impl Into<String>, scope: StoreScope) -> Promise<()> {
        let registry = Arc::clone(&self.registry);
        let name = name.into();
        Promise::new(Operation::RemoveStore, async move {
            let key = StoreKey::new(StoreName::new(name)?, scope);
            registry.remove(&key).await
        })
    }

    /// Close and delete a global store.
    pub fn remove_global_store(&self, name: impl Into<String>) -> Promise<()> {
        self.remove_store(name, StoreScope::Global)
    }

    /// Close and delete one of the current user's stores.
    pub fn remove_shared_store(&self, name: impl Into<String>) -> Promise<()> {
        match self.user_scope() {
            Ok(scope) => self.remove_store(name, scope),
            Err(error) => reject(Operation::RemoveStore, error),
        }
    }

    /// Remove every store in a scope. Resolves with how many were removed.
    pub fn remove_all_stores_in(&self, scope: StoreScope) -> Promise<usize> {
        let registry = Arc::clone(&self.registry);
        Promise::new(Operation::RemoveAllStores, async move {
            registry.remove_all(&scope).await
        })
    }

    /// Remove every global store.
    pub fn remove_all_global_stores(&self) -> Promise<usize> {
        self.remove_all_stores_in(StoreScope::Global)
    }

    /// Remove every store of the current user.
    pub fn remove_all_stores(&self) -> Promise<usize> {
        match self.user_scope() {
            Ok(scope) => self.remove_all_stores_in(scope),
            Err(error) => reject(Operation::RemoveAllStores, error),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Listing Stores
    // ─────────────────────────────────────────────────────────────────────────

    /// Names of all stores in a scope.
    pub fn store_names_in(&self, scope: StoreScope) -> Promise<Vec<StoreName>> {
        let registry = Arc::clone(&self.registry);
        Promise::new(Operation::StoreNames, async move {
            registry.store_names(&scope).await
        })
    }

    /// Names of all global stores.
    pub fn global_store_names(&self) -> Promise<Vec<StoreName>> {
        self.store_names_in(StoreScope::Global)
    }

    /// Names of all of the current user's stores.
    pub fn store_names(&self) -> Promise<Vec<StoreName>> {
        match self.user_scope() {
            Ok(scope) => self.store_names_in(scope),
            Err(error) => reject(Operation::StoreNames, error),
        }
    }

    /// Invalidate every open handle. Data stays on disk.
    pub async fn shutdown(&self) {
        self.registry.close_all().await;
        tracing::info!("client shut down");
    }
}

fn reject<T: Send + 'static>(operation: Operation, error: StoreError) -> Promise<T> {
    Promise::rejected(OperationError::new(operation, error))
}

/// Promise-returning soup operations for one store.
///
/// Obtained through [`StoreHandle::promises`].
pub struct StorePromises<E: Engine> {
    handle: StoreHandle<E>,
}

impl<E: Engine> StorePromises<E> {
    pub(crate) fn new(handle: StoreHandle<E>) -> Self {
        Self { handle }
    }

    pub fn handle(&self) -> &StoreHandle<E> {
        &self.handle
    }

    pub fn soup_exists(&self, soup: impl Into<String>) -> Promise<bool> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::SoupExists, async move { handle.soup_exists(&soup).await })
    }

    pub fn register_soup(&self, soup: impl Into<String>, indices: Vec<IndexSpec>) -> Promise<bool> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::RegisterSoup, async move {
            handle.register_soup(&soup, &indices).await
        })
    }

    /// Register with index specs given as JSON dictionaries.
    pub fn register_soup_from_json(&self, soup: impl Into<String>, indices: Value) -> Promise<bool> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::RegisterSoup, async move {
            handle.register_soup_from_json(&soup, &indices).await
        })
    }

    pub fn register_soup_with_spec(&self, spec: SoupSpec, indices: Vec<IndexSpec>) -> Promise<bool> {
        let handle = self.handle.clone();
        Promise::new(Operation::RegisterSoup, async move {
            handle.register_soup_with_spec(&spec, &indices).await
        })
    }

    pub fn remove_soup(&self, soup: impl Into<String>) -> Promise<()> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::RemoveSoup, async move { handle.remove_soup(&soup).await })
    }

    pub fn remove_all_soups(&self) -> Promise<()> {
        let handle = self.handle.clone();
        Promise::new(Operation::RemoveAllSoups, async move { handle.remove_all_soups().await })
    }

    pub fn soup_names(&self) -> Promise<Vec<String>> {
        let handle = self.handle.clone();
        Promise::new(Operation::SoupNames, async move { handle.soup_names().await })
    }

    pub fn soup_indices(&self, soup: impl Into<String>) -> Promise<Vec<IndexSpec>> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::SoupIndices, async move { handle.soup_indices(&soup).await })
    }

    pub fn soup_spec(&self, soup: impl Into<String>) -> Promise<SoupSpec> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::SoupSpec, async move { handle.soup_spec(&soup).await })
    }

    pub fn clear_soup(&self, soup: impl Into<String>) -> Promise<()> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::ClearSoup, async move { handle.clear_soup(&soup).await })
    }

    pub fn upsert_entries(&self, soup: impl Into<String>, entries: Vec<Value>) -> Promise<Vec<Value>> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::UpsertEntries, async move {
            handle.upsert_entries(&soup, entries).await
        })
    }

    /// Upsert, matching existing entries on the value at `external_id_path`.
    pub fn upsert_entries_with_external_id(
        &self,
        soup: impl Into<String>,
        entries: Vec<Value>,
        external_id_path: impl Into<String>,
    ) -> Promise<Vec<Value>> {
        let handle = self.handle.clone();
        let soup = soup.into();
        let path = external_id_path.into();
        Promise::new(Operation::UpsertEntries, async move {
            handle.upsert_entries_with_external_id(&soup, entries, &path).await
        })
    }

    pub fn lookup_entry_id(
        &self,
        soup: impl Into<String>,
        path: impl Into<String>,
        value: Value,
    ) -> Promise<Option<SoupEntryId>> {
        let handle = self.handle.clone();
        let soup = soup.into();
        let path = path.into();
        Promise::new(Operation::LookupEntryId, async move {
            handle.lookup_entry_id(&soup, &path, &value).await
        })
    }

    pub fn retrieve_entries(
        &self,
        soup: impl Into<String>,
        ids: Vec<SoupEntryId>,
    ) -> Promise<Vec<Value>> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::RetrieveEntries, async move {
            handle.retrieve_entries(&soup, &ids).await
        })
    }

    pub fn remove_entries(&self, soup: impl Into<String>, ids: Vec<SoupEntryId>) -> Promise<()> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::RemoveEntries, async move {
            handle.remove_entries(&soup, &ids).await
        })
    }

    pub fn entry_count(&self, soup: impl Into<String>) -> Promise<u64> {
        let handle = self.handle.clone();
        let soup = soup.into();
        Promise::new(Operation::EntryCount, async move { handle.entry_count(&soup).await })
    }
}
