//! In-memory implementation of the Engine trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use serde_json::Value;

use smartstore_core::entry::{self, SoupEntryId};
use smartstore_core::{IndexSpec, SoupSpec, StoreKey, StoreName, StoreScope};

use crate::error::{EngineError, Result};
use crate::now_millis;
use crate::traits::Engine;

/// In-memory engine implementation.
///
/// All data is lost when the engine is dropped. Thread-safe via RwLock.
pub struct MemoryEngine {
    stores: RwLock<HashMap<StoreKey, MemoryHandle>>,

    /// When set, `open_store` fails as if storage could not be allocated.
    unavailable: AtomicBool,
}

/// Handle to a store held by a [`MemoryEngine`].
#[derive(Debug, Clone)]
pub struct MemoryHandle {
    key: StoreKey,
    data: Arc<RwLock<StoreData>>,
}

impl MemoryHandle {
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreData>> {
        let data = self.data.read().map_err(|e| EngineError::Task(format!("lock poisoned: {e}")))?;
        if data.deleted {
            return Err(EngineError::StoreNotFound(self.key.clone()));
        }
        Ok(data)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreData>> {
        let data = self.data.write().map_err(|e| EngineError::Task(format!("lock poisoned: {e}")))?;
        if data.deleted {
            return Err(EngineError::StoreNotFound(self.key.clone()));
        }
        Ok(data)
    }
}

#[derive(Debug, Default)]
struct StoreData {
    soups: BTreeMap<String, SoupData>,
    deleted: bool,
}

impl StoreData {
    fn soup(&self, name: &str) -> Result<&SoupData> {
        self.soups
            .get(name)
            .ok_or_else(|| EngineError::SoupNotFound(name.to_string()))
    }

    fn soup_mut(&mut self, name: &str) -> Result<&mut SoupData> {
        self.soups
            .get_mut(name)
            .ok_or_else(|| EngineError::SoupNotFound(name.to_string()))
    }
}

#[derive(Debug)]
struct SoupData {
    spec: SoupSpec,
    indices: Vec<IndexSpec>,
    entries: BTreeMap<SoupEntryId, Value>,
    next_id: SoupEntryId,
}

impl SoupData {
    fn require_indexed(&self, soup: &str, path: &str) -> Result<()> {
        if path == entry::SOUP_ENTRY_ID || self.indices.iter().any(|i| i.path() == path) {
            Ok(())
        } else {
            Err(EngineError::not_indexed(soup, path))
        }
    }

    /// Apply a batch to a staged copy, committing only if every entry succeeds.
    fn upsert(
        &mut self,
        soup: &str,
        entries: Vec<Value>,
        external_id_path: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut staged = self.entries.clone();
        let mut next_id = self.next_id;
        let now = now_millis();

        let mut stored = Vec::with_capacity(entries.len());
        for mut e in entries {
            if !e.is_object() {
                return Err(EngineError::InvalidEntry(format!("expected object, got {e}")));
            }

            let requested = match external_id_path {
                Some(path) if path != entry::SOUP_ENTRY_ID => {
                    match entry::project(&e, path).filter(|v| !v.is_null()) {
                        Some(value) => find_by_path(&staged, soup, path, value)?,
                        None => None,
                    }
                }
                _ => entry::entry_id(&e),
            };

            let id = match requested {
                Some(id) if staged.contains_key(&id) => id,
                Some(id) => {
                    return Err(EngineError::InvalidEntry(format!(
                        "no entry with {} {} in soup {}",
                        entry::SOUP_ENTRY_ID,
                        id,
                        soup
                    )))
                }
                None => {
                    let id = next_id;
                    next_id += 1;
                    id
                }
            };

            if let Some(obj) = e.as_object_mut() {
                entry::stamp(obj, id, now);
            }
            staged.insert(id, e.clone());
            stored.push(e);
        }

        self.entries = staged;
        self.next_id = next_id;
        Ok(stored)
    }
}

/// The single entry whose value at `path` equals `value`.
fn find_by_path(
    entries: &BTreeMap<SoupEntryId, Value>,
    soup: &str,
    path: &str,
    value: &Value,
) -> Result<Option<SoupEntryId>> {
    let mut matches = entries
        .iter()
        .filter(|(_, e)| entry::project(e, path) == Some(value))
        .map(|(id, _)| *id);

    let found = matches.next();
    if matches.next().is_some() {
        return Err(EngineError::ambiguous_match(soup, path, value));
    }
    Ok(found)
}

impl MemoryEngine {
    /// Create a new empty in-memory engine.
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make subsequent `open_store` calls fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn stores_read(&self) -> Result<RwLockReadGuard<'_, HashMap<StoreKey, MemoryHandle>>> {
        self.stores
            .read()
            .map_err(|e| EngineError::Task(format!("lock poisoned: {e}")))
    }

    fn stores_write(&self) -> Result<RwLockWriteGuard<'_, HashMap<StoreKey, MemoryHandle>>> {
        self.stores
            .write()
            .map_err(|e| EngineError::Task(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Engine for MemoryEngine {
    type Handle = MemoryHandle;

    async fn open_store(&self, key: &StoreKey) -> Result<MemoryHandle> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(EngineError::Unavailable(format!("cannot allocate store {key}")));
        }

        let mut stores = self.stores_write()?;
        let handle = stores
            .entry(key.clone())
            .or_insert_with(|| MemoryHandle {
                key: key.clone(),
                data: Arc::new(RwLock::new(StoreData::default())),
            })
            .clone();

        Ok(handle)
    }

    async fn delete_store(&self, key: &StoreKey) -> Result<()> {
        let handle = self
            .stores_write()?
            .remove(key)
            .ok_or_else(|| EngineError::StoreNotFound(key.clone()))?;

        let mut data = handle.write()?;
        data.soups.clear();
        data.deleted = true;
        Ok(())
    }

    async fn store_exists(&self, key: &StoreKey) -> Result<bool> {
        Ok(self.stores_read()?.contains_key(key))
    }

    async fn store_names(&self, scope: &StoreScope) -> Result<Vec<StoreName>> {
        let mut names: Vec<StoreName> = self
            .stores_read()?
            .keys()
            .filter(|key| &key.scope == scope)
            .map(|key| key.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn soup_exists(&self, handle: &MemoryHandle, soup: &str) -> Result<bool> {
        Ok(handle.read()?.soups.contains_key(soup))
    }

    async fn register_soup(
        &self,
        handle: &MemoryHandle,
        spec: &SoupSpec,
        indices: &[IndexSpec],
    ) -> Result<bool> {
        let mut data = handle.write()?;
        if data.soups.contains_key(spec.name()) {
            return Ok(false);
        }

        data.soups.insert(
            spec.name().to_string(),
            SoupData {
                spec: spec.clone(),
                indices: indices.to_vec(),
                entries: BTreeMap::new(),
                next_id: 1,
            },
        );
        Ok(true)
    }

    async fn remove_soup(&self, handle: &MemoryHandle, soup: &str) -> Result<bool> {
        Ok(handle.write()?.soups.remove(soup).is_some())
    }

    async fn soup_names(&self, handle: &MemoryHandle) -> Result<Vec<String>> {
        Ok(handle.read()?.soups.keys().cloned().collect())
    }

    async fn soup_indices(
        &self,
        handle: &MemoryHandle,
        soup: &str,
    ) -> Result<Option<Vec<IndexSpec>>> {
        Ok(handle.read()?.soups.get(soup).map(|s| s.indices.clone()))
    }

    async fn soup_spec(&self, handle: &MemoryHandle, soup: &str) -> Result<Option<SoupSpec>> {
        Ok(handle.read()?.soups.get(soup).map(|s| s.spec.clone()))
    }

    async fn clear_soup(&self, handle: &MemoryHandle, soup: &str) -> Result<()> {
        handle.write()?.soup_mut(soup)?.entries.clear();
        Ok(())
    }

    async fn upsert_entries(
        &self,
        handle: &MemoryHandle,
        soup: &str,
        entries: Vec<Value>,
    ) -> Result<Vec<Value>> {
        let mut data = handle.write()?;
        data.soup_mut(soup)?.upsert(soup, entries, None)
    }

    async fn upsert_entries_with_external_id(
        &self,
        handle: &MemoryHandle,
        soup: &str,
        entries: Vec<Value>,
        external_id_path: &str,
    ) -> Result<Vec<Value>> {
        let mut data = handle.write()?;
        let soup_data = data.soup_mut(soup)?;
        soup_data.require_indexed(soup, external_id_path)?;
        soup_data.upsert(soup, entries, Some(external_id_path))
    }

    async fn lookup_entry_id(
        &self,
        handle: &MemoryHandle,
        soup: &str,
        path: &str,
        value: &Value,
    ) -> Result<Option<SoupEntryId>> {
        let data = handle.read()?;
        let soup_data = data.soup(soup)?;
        soup_data.require_indexed(soup, path)?;
        find_by_path(&soup_data.entries, soup, path, value)
    }

    async fn retrieve_entries(
        &self,
        handle: &MemoryHandle,
        soup: &str,
        ids: &[SoupEntryId],
    ) -> Result<Vec<Value>> {
        let data = handle.read()?;
        let soup_data = data.soup(soup)?;

        Ok(ids
            .iter()
            .filter_map(|id| soup_data.entries.get(id).cloned())
            .collect())
    }

    async fn remove_entries(
        &self,
        handle: &MemoryHandle,
        soup: &str,
        ids: &[SoupEntryId],
    ) -> Result<()> {
        let mut data = handle.write()?;
        let soup_data = data.soup_mut(soup)?;
        for id in ids {
            soup_data.entries.remove(id);
        }
        Ok(())
    }

    async fn entry_count(&self, handle: &MemoryHandle, soup: &str) -> Result<u64> {
        Ok(handle.read()?.soup(soup)?.entries.len() as u64)
    }
}
