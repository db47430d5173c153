//! Cache registry: one live instance per definition key

use crate::cache::definition::CacheKey;
use crate::cache::handle::VaultCache;
use crate::cache::record::OutputRecord;
use crate::error::{VaultCacheError, VaultCacheResult};
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Shared handle to a cache of `O` records
pub type CacheHandle<O> = Arc<dyn VaultCache<O>>;

struct Entries<O> {
    caches: HashMap<CacheKey, CacheHandle<O>>,
    shut_down: bool,
}

/// Registry owned by the composition root.
///
/// Every consumer asking for the same key gets the same instance, so one
/// logical dataset never runs two decryption passes side by side.
pub struct CacheRegistry<O> {
    entries: Mutex<Entries<O>>,
}

impl<O: OutputRecord> Default for CacheRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: OutputRecord> CacheRegistry<O> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries {
                caches: HashMap::new(),
                shut_down: false,
            }),
        }
    }

    /// Return the instance for `key`, building it with `factory` on first use
    pub fn get_or_create<F>(&self, key: &CacheKey, factory: F) -> VaultCacheResult<CacheHandle<O>>
    where
        F: FnOnce() -> VaultCacheResult<CacheHandle<O>>,
    {
        let mut entries = self.lock()?;
        if entries.shut_down {
            return Err(VaultCacheError::RegistryShutdown);
        }
        if let Some(cache) = entries.caches.get(key) {
            return Ok(Arc::clone(cache));
        }

        let cache = factory()?;
        if cache.key() != key {
            return Err(VaultCacheError::Internal(format!(
                "factory for {} built cache {}",
                key,
                cache.key()
            )));
        }

        debug!("Registered {} cache {}", cache.mode_name(), key);
        entries.caches.insert(key.clone(), Arc::clone(&cache));
        Ok(cache)
    }

    /// Look up an instance without creating one
    pub fn get(&self, key: &CacheKey) -> Option<CacheHandle<O>> {
        self.lock()
            .ok()
            .and_then(|entries| entries.caches.get(key).cloned())
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self
            .lock()
            .map(|entries| entries.caches.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.lock().map(|entries| entries.caches.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every instance and refuse new ones. Persisted cells are kept.
    pub async fn shutdown(&self) {
        let caches: Vec<CacheHandle<O>> = match self.lock() {
            Ok(mut entries) => {
                entries.shut_down = true;
                entries.caches.drain().map(|(_, cache)| cache).collect()
            }
            Err(_) => return,
        };

        info!("Shutting down {} caches", caches.len());
        join_all(caches.iter().map(|cache| cache.shutdown())).await;
    }

    fn lock(&self) -> VaultCacheResult<MutexGuard<'_, Entries<O>>> {
        self.entries
            .lock()
            .map_err(|_| VaultCacheError::Internal("cache registry poisoned".to_string()))
    }
}
