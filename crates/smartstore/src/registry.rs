//! The store registry: at most one live handle per (name, scope).
//!
//! Each key gets a slot guarded by its own async mutex. Opening and removing
//! a store lock the slot for the whole engine call, so same-key calls are
//! serialized while different keys proceed concurrently. A slot left empty
//! by a remove, a close or a failed open is dropped once no other call holds it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use smartstore_core::{StoreKey, StoreName, StoreScope};
use smartstore_engine::Engine;

use crate::error::Result;
use crate::handle::StoreHandle;

type Slot<E> = Arc<Mutex<Option<StoreHandle<E>>>>;

/// Tracks open store handles.
///
/// Registries are plain values: create one per application (or per test) and
/// share it through an `Arc`.
pub struct StoreRegistry<E: Engine> {
    engine: Arc<E>,
    slots: Mutex<HashMap<StoreKey, Slot<E>>>,
}

impl<E: Engine> StoreRegistry<E> {
    /// Create a registry over an engine.
    pub fn new(engine: E) -> Self {
        Self::with_engine(Arc::new(engine))
    }

    /// Create a registry over a shared engine.
    pub fn with_engine(engine: Arc<E>) -> Self {
        Self {
            engine,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Get the engine reference.
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The slot for a key, created on first use.
    async fn slot(&self, key: &StoreKey) -> Slot<E> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Drop `key`'s slot if it is empty and `slot` is the only reference
    /// outside the map. The caller must not hold the slot's lock.
    async fn release(&self, key: &StoreKey, slot: Slot<E>) {
        let mut slots = self.slots.lock().await;
        let idle = slots
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, &slot))
            && Arc::strong_count(&slot) == 2
            && slot.try_lock().is_ok_and(|cached| cached.is_none());
        if idle {
            slots.remove(key);
        }
    }

    /// Return the open handle for `key`, opening or creating the store if needed.
    pub async fn open_or_create(&self, key: &StoreKey) -> Result<StoreHandle<E>> {
        let slot = self.slot(key).await;
        let mut cached = slot.lock().await;

        if let Some(handle) = cached.as_ref().filter(|h| h.is_valid()) {
            return Ok(handle.clone());
        }

        let raw = match self.engine.open_store(key).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(store = %key, error = %e, "failed to open store");
                drop(cached);
                self.release(key, slot).await;
                return Err(e.into());
            }
        };
        let handle = StoreHandle::new(key.clone(), Arc::clone(&self.engine), raw);
        *cached = Some(handle.clone());

        tracing::info!(store = %key, "opened store");
        Ok(handle)
    }

    /// Close and delete a store.
    ///
    /// Any cached handle is invalidated first, even if the engine then
    /// reports that the store does not exist.
    pub async fn remove(&self, key: &StoreKey) -> Result<()> {
        let slot = self.slot(key).await;
        let deleted = {
            let mut cached = slot.lock().await;
            if let Some(handle) = cached.take() {
                handle.invalidate();
            }
            self.engine.delete_store(key).await
        };
        self.release(key, slot).await;

        deleted?;
        tracing::info!(store = %key, "removed store");
        Ok(())
    }

    /// Names of all stores that exist in a scope.
    pub async fn store_names(&self, scope: &StoreScope) -> Result<Vec<StoreName>> {
        Ok(self.engine.store_names(scope).await?)
    }

    /// Remove every store in a scope. Returns how many were removed.
    pub async fn remove_all(&self, scope: &StoreScope) -> Result<usize> {
        let names = self.engine.store_names(scope).await?;
        for name in &names {
            self.remove(&StoreKey::new(name.clone(), scope.clone())).await?;
        }

        // Handles may be cached for stores the engine no longer lists
        self.close_matching(|key| &key.scope == scope).await;

        tracing::info!(%scope, count = names.len(), "removed all stores");
        Ok(names.len())
    }

    /// Whether a valid handle is cached for `key`.
    pub async fn is_open(&self, key: &StoreKey) -> bool {
        let slot = {
            let slots = self.slots.lock().await;
            match slots.get(key) {
                Some(slot) => Arc::clone(slot),
                None => return false,
            }
        };
        let cached = slot.lock().await;
        cached.as_ref().is_some_and(|h| h.is_valid())
    }

    /// Invalidate and drop every cached handle without deleting any data.
    pub async fn close_all(&self) {
        self.close_matching(|_| true).await;
    }

    async fn close_matching(&self, matches: impl Fn(&StoreKey) -> bool) {
        let slots: Vec<(StoreKey, Slot<E>)> = {
            let slots = self.slots.lock().await;
            slots
                .iter()
                .filter(|(key, _)| matches(key))
                .map(|(key, slot)| (key.clone(), Arc::clone(slot)))
                .collect()
        };

        for (key, slot) in slots {
            let taken = slot.lock().await.take();
            if let Some(handle) = taken {
                handle.invalidate();
                tracing::debug!(store = %key, "closed store");
            }
            self.release(&key, slot).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use smartstore_core::{IndexSpec, UserId};
    use smartstore_engine::MemoryEngine;

    fn global(name: &str) -> StoreKey {
        StoreKey::global(StoreName::new(name).unwrap())
    }

    fn shared(name: &str) -> StoreKey {
        StoreKey::user(StoreName::new(name).unwrap(), UserId::new("org", "usr"))
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let registry = StoreRegistry::new(MemoryEngine::new());

        let a = registry.open_or_create(&global("G1")).await.unwrap();
        let b = registry.open_or_create(&global("G1")).await.unwrap();
        assert!(a.same_store(&b));

        a.register_soup("S", &[IndexSpec::string("key").unwrap()])
            .await
            .unwrap();
        assert!(b.soup_exists("S").await.unwrap());
    }

    #[tokio::test]
    async fn test_scopes_are_distinct_keys() {
        let registry = StoreRegistry::new(MemoryEngine::new());

        let g = registry.open_or_create(&global("cookbook")).await.unwrap();
        let u = registry.open_or_create(&shared("cookbook")).await.unwrap();
        assert!(!g.same_store(&u));
    }

    #[tokio::test]
    async fn test_remove_invalidates_handles() {
        let registry = StoreRegistry::new(MemoryEngine::new());
        let key = global("G1");

        let handle = registry.open_or_create(&key).await.unwrap();
        registry.remove(&key).await.unwrap();

        assert!(!handle.is_valid());
        assert!(!registry.is_open(&key).await);
        let err = handle.soup_exists("X").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HandleInvalidated);

        // Reopening yields a fresh, empty store
        let fresh = registry.open_or_create(&key).await.unwrap();
        assert!(fresh.is_valid());
        assert!(!fresh.same_store(&handle));
    }

    #[tokio::test]
    async fn test_remove_unknown_store() {
        let registry = StoreRegistry::new(MemoryEngine::new());
        let err = registry.remove(&global("nope")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreNotFound);
    }

    #[tokio::test]
    async fn test_open_unavailable() {
        let engine = MemoryEngine::new();
        engine.set_unavailable(true);
        let registry = StoreRegistry::new(engine);

        let err = registry.open_or_create(&global("G1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
        assert!(!registry.is_open(&global("G1")).await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_share_one_handle() {
        let registry = Arc::new(StoreRegistry::new(MemoryEngine::new()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.open_or_create(&global("G1")).await })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }
        assert!(handles.iter().all(|h| h.same_store(&handles[0])));
    }

    #[tokio::test]
    async fn test_remove_all_and_close_all() {
        let registry = StoreRegistry::new(MemoryEngine::new());

        let g1 = registry.open_or_create(&global("G1")).await.unwrap();
        registry.open_or_create(&global("G2")).await.unwrap();
        let l1 = registry.open_or_create(&shared("L1")).await.unwrap();

        assert_eq!(
            registry.store_names(&StoreScope::Global).await.unwrap(),
            vec![StoreName::new("G1").unwrap(), StoreName::new("G2").unwrap()]
        );

        assert_eq!(registry.remove_all(&StoreScope::Global).await.unwrap(), 2);
        assert!(!g1.is_valid());
        assert!(l1.is_valid());
        assert!(registry.store_names(&StoreScope::Global).await.unwrap().is_empty());

        registry.close_all().await;
        assert!(!l1.is_valid());
        // Closing keeps data
        assert_eq!(
            registry.store_names(l1.scope()).await.unwrap(),
            vec![StoreName::new("L1").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_empty_slots_are_dropped() {
        let engine = MemoryEngine::new();
        let registry = StoreRegistry::new(engine);

        registry.open_or_create(&global("G1")).await.unwrap();
        registry.open_or_create(&shared("L1")).await.unwrap();
        assert_eq!(registry.slots.lock().await.len(), 2);

        registry.remove(&global("G1")).await.unwrap();
        assert_eq!(registry.slots.lock().await.len(), 1);

        // Failed removes and opens leave nothing behind either
        registry.remove(&global("never-opened")).await.unwrap_err();
        registry.engine().set_unavailable(true);
        registry.open_or_create(&global("G2")).await.unwrap_err();
        registry.engine().set_unavailable(false);
        assert_eq!(registry.slots.lock().await.len(), 1);

        registry.close_all().await;
        assert!(registry.slots.lock().await.is_empty());

        // Reopening after a close starts a fresh slot
        let reopened = registry.open_or_create(&shared("L1")).await.unwrap();
        assert!(reopened.is_valid());
        assert_eq!(registry.slots.lock().await.len(), 1);
    }
}
