//! The two persisted cells owned by each cache

use crate::cache::definition::CacheKey;
use crate::cache::record::{OutputRecord, RecordMap};
use crate::cache::status::DecryptionStatus;
use crate::cache::subscription::{CacheSubscription, ReleaseHook};
use crate::error::VaultCacheResult;
use crate::state::{SlotKey, StateCell, StateStore};
use std::sync::Arc;

/// Value and status cells of one cache for one user
pub struct CacheCells<O> {
    pub value: StateCell<RecordMap<O>>,
    pub status: StateCell<DecryptionStatus>,
}

impl<O> Clone for CacheCells<O> {
    fn clone(&self) -> Self {
        Self {
            value: self.value.clone(),
            status: self.status.clone(),
        }
    }
}

impl<O: OutputRecord> CacheCells<O> {
    pub fn new(store: Arc<dyn StateStore>, key: &CacheKey, user: &str) -> Self {
        let (value_slot, status_slot) = slots(key, user);
        Self {
            value: StateCell::new(Arc::clone(&store), value_slot),
            status: StateCell::new(store, status_slot),
        }
    }

    /// Persisted status; an unwritten slot reads as `cleared`
    pub async fn status(&self) -> VaultCacheResult<DecryptionStatus> {
        Ok(self.status.get().await?.unwrap_or_default())
    }

    /// Open a subscription over both cells
    pub(crate) async fn subscribe(
        &self,
        release: Option<ReleaseHook>,
    ) -> VaultCacheResult<CacheSubscription<O>> {
        let value_rx = self.value.watch().await?;
        let status_rx = self.status.watch().await?;
        Ok(CacheSubscription::new(
            self.value.slot().clone(),
            self.status.slot().clone(),
            value_rx,
            status_rx,
            release,
        ))
    }
}

/// Value and status slot addresses for a cache key
pub fn slots(key: &CacheKey, user: &str) -> (SlotKey, SlotKey) {
    (
        SlotKey::new(key.area(), user, key.value_slot()),
        SlotKey::new(key.area(), user, key.status_slot()),
    )
}

/// Reset a cache's cells without a live owner: value `null`, status `cleared`.
///
/// Only meant for offline maintenance; a running local cache resets through
/// its own `clear()`.
pub async fn reset_cells(store: &dyn StateStore, key: &CacheKey, user: &str) -> VaultCacheResult<()> {
    let (value_slot, status_slot) = slots(key, user);
    store.update(&value_slot, None).await?;
    let status = serde_json::to_value(DecryptionStatus::Cleared)?;
    store.update(&status_slot, Some(status)).await?;
    Ok(())
}
