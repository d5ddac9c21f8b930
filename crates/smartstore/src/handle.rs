//! Store handles and soup lifecycle operations.
//!
//! A [`StoreHandle`] is a shared reference to an open store. The registry
//! owns the canonical handle for each key; clones handed to callers share its
//! validity flag, so removing or closing the store invalidates every clone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

use smartstore_core::{
    validate_index_specs, IndexSpec, SoupEntryId, SoupSpec, StoreKey, StoreName, StoreScope,
};
use smartstore_engine::Engine;

use crate::client::StorePromises;
use crate::error::{Result, StoreError};

/// A live reference to an open store.
pub struct StoreHandle<E: Engine> {
    inner: Arc<HandleInner<E>>,
}

struct HandleInner<E: Engine> {
    key: StoreKey,
    engine: Arc<E>,
    raw: E::Handle,
    valid: AtomicBool,

    /// Serializes soup operations so check-then-act sequences are atomic.
    soup_lock: Mutex<()>,
}

impl<E: Engine> Clone for StoreHandle<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: Engine> std::fmt::Debug for StoreHandle<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("key", &self.inner.key)
            .field("valid", &self.is_valid())
            .finish()
    }
}

impl<E: Engine> StoreHandle<E> {
    pub(crate) fn new(key: StoreKey, engine: Arc<E>, raw: E::Handle) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                key,
                engine,
                raw,
                valid: AtomicBool::new(true),
                soup_lock: Mutex::new(()),
            }),
        }
    }

    pub fn key(&self) -> &StoreKey {
        &self.inner.key
    }

    pub fn name(&self) -> &StoreName {
        &self.inner.key.name
    }

    pub fn scope(&self) -> &StoreScope {
        &self.inner.key.scope
    }

    /// The engine's own handle for this store.
    pub fn raw(&self) -> &E::Handle {
        &self.inner.raw
    }

    /// False once the store has been removed or closed through the registry.
    pub fn is_valid(&self) -> bool {
        self.inner.valid.load(Ordering::SeqCst)
    }

    /// Whether two handles refer to the same open store.
    pub fn same_store(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Promise-returning versions of the soup operations.
    pub fn promises(&self) -> StorePromises<E> {
        StorePromises::new(self.clone())
    }

    pub(crate) fn invalidate(&self) {
        self.inner.valid.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> Result<&E::Handle> {
        if !self.is_valid() {
            return Err(StoreError::HandleInvalidated(self.inner.key.clone()));
        }
        Ok(&self.inner.raw)
    }

    fn engine(&self) -> &E {
        &self.inner.engine
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Soup Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Check whether a soup exists. False for names never registered.
    pub async fn soup_exists(&self, soup: &str) -> Result<bool> {
        let raw = self.check()?;
        Ok(self.engine().soup_exists(raw, soup).await?)
    }

    /// Register a soup with the given index specs.
    ///
    /// Registering again with identical specs is a no-op that returns `true`.
    /// Registering with different specs fails with `SoupAlreadyExists`.
    pub async fn register_soup(&self, soup: &str, indices: &[IndexSpec]) -> Result<bool> {
        self.check()?;
        let spec = SoupSpec::new(soup)?;
        self.register_soup_with_spec(&spec, indices).await
    }

    /// Register a soup from a JSON array of `{"path", "type"}` dictionaries.
    pub async fn register_soup_from_json(&self, soup: &str, indices: &Value) -> Result<bool> {
        self.check()?;
        let indices = IndexSpec::list_from_json(indices)?;
        self.register_soup(soup, &indices).await
    }

    /// Register a soup with explicit attributes.
    pub async fn register_soup_with_spec(
        &self,
        spec: &SoupSpec,
        indices: &[IndexSpec],
    ) -> Result<bool> {
        let raw = self.check()?;
        validate_index_specs(indices)?;
        let _guard = self.inner.soup_lock.lock().await;

        if self.engine().register_soup(raw, spec, indices).await? {
            tracing::info!(
                store = %self.inner.key,
                soup = spec.name(),
                indices = indices.len(),
                "registered soup"
            );
            return Ok(true);
        }

        let existing_indices = self.engine().soup_indices(raw, spec.name()).await?;
        let existing_spec = self.engine().soup_spec(raw, spec.name()).await?;
        match (existing_indices, existing_spec) {
            (Some(existing_indices), Some(existing_spec))
                if existing_indices == indices && &existing_spec == spec =>
            {
                tracing::debug!(store = %self.inner.key, soup = spec.name(), "soup already registered");
                Ok(true)
            }
            (Some(_), Some(_)) => Err(StoreError::SoupAlreadyExists(spec.name().to_string())),
            _ => Err(StoreError::SoupNotFound(spec.name().to_string())),
        }
    }

    /// Remove a soup and all of its entries.
    pub async fn remove_soup(&self, soup: &str) -> Result<()> {
        let raw = self.check()?;
        let _guard = self.inner.soup_lock.lock().await;

        if !self.engine().remove_soup(raw, soup).await? {
            return Err(StoreError::SoupNotFound(soup.to_string()));
        }

        tracing::info!(store = %self.inner.key, soup, "removed soup");
        Ok(())
    }

    /// Remove every soup in the store.
    pub async fn remove_all_soups(&self) -> Result<()> {
        let raw = self.check()?;
        let _guard = self.inner.soup_lock.lock().await;

        for soup in self.engine().soup_names(raw).await? {
            self.engine().remove_soup(raw, &soup).await?;
        }
        Ok(())
    }

    /// Names of all soups in the store, sorted.
    pub async fn soup_names(&self) -> Result<Vec<String>> {
        let raw = self.check()?;
        Ok(self.engine().soup_names(raw).await?)
    }

    /// The index specs a soup was registered with.
    pub async fn soup_indices(&self, soup: &str) -> Result<Vec<IndexSpec>> {
        let raw = self.check()?;
        self.engine()
            .soup_indices(raw, soup)
            .await?
            .ok_or_else(|| StoreError::SoupNotFound(soup.to_string()))
    }

    /// The attributes a soup was registered with.
    pub async fn soup_spec(&self, soup: &str) -> Result<SoupSpec> {
        let raw = self.check()?;
        self.engine()
            .soup_spec(raw, soup)
            .await?
            .ok_or_else(|| StoreError::SoupNotFound(soup.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entries
    // ─────────────────────────────────────────────────────────────────────────

    /// Delete all entries of a soup, keeping the soup registered.
    pub async fn clear_soup(&self, soup: &str) -> Result<()> {
        let raw = self.check()?;
        Ok(self.engine().clear_soup(raw, soup).await?)
    }

    /// Insert or update entries, returning them with system fields set.
    pub async fn upsert_entries(&self, soup: &str, entries: Vec<Value>) -> Result<Vec<Value>> {
        let raw = self.check()?;
        Ok(self.engine().upsert_entries(raw, soup, entries).await?)
    }

    /// Insert or update entries matched on the value at `external_id_path`.
    ///
    /// The path must be one of the soup's index paths.
    pub async fn upsert_entries_with_external_id(
        &self,
        soup: &str,
        entries: Vec<Value>,
        external_id_path: &str,
    ) -> Result<Vec<Value>> {
        let raw = self.check()?;
        Ok(self
            .engine()
            .upsert_entries_with_external_id(raw, soup, entries, external_id_path)
            .await?)
    }

    /// Id of the entry whose value at `path` equals `value`, if any.
    pub async fn lookup_entry_id(
        &self,
        soup: &str,
        path: &str,
        value: &Value,
    ) -> Result<Option<SoupEntryId>> {
        let raw = self.check()?;
        Ok(self.engine().lookup_entry_id(raw, soup, path, value).await?)
    }

    /// Fetch entries by id, skipping ids that do not exist.
    pub async fn retrieve_entries(&self, soup: &str, ids: &[SoupEntryId]) -> Result<Vec<Value>> {
        let raw = self.check()?;
        Ok(self.engine().retrieve_entries(raw, soup, ids).await?)
    }

    /// Delete entries by id.
    pub async fn remove_entries(&self, soup: &str, ids: &[SoupEntryId]) -> Result<()> {
        let raw = self.check()?;
        Ok(self.engine().remove_entries(raw, soup, ids).await?)
    }

    /// Number of entries in a soup.
    pub async fn entry_count(&self, soup: &str) -> Result<u64> {
        let raw = self.check()?;
        Ok(self.engine().entry_count(raw, soup).await?)
    }
}
