//! Read-only subscriptions to a cache's value and status

use crate::cache::record::RecordMap;
use crate::cache::status::DecryptionStatus;
use crate::error::{VaultCacheError, VaultCacheResult};
use crate::state::{decode_snapshot, SlotKey, SlotSnapshot};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::sync::watch;

/// Released when a subscription is dropped
pub(crate) type ReleaseHook = Box<dyn FnOnce() + Send + Sync>;

/// Live view of one cache. Holding it keeps the cache's driver running.
pub struct CacheSubscription<O> {
    value_slot: SlotKey,
    status_slot: SlotKey,
    value_rx: watch::Receiver<SlotSnapshot>,
    status_rx: watch::Receiver<SlotSnapshot>,
    release: Option<ReleaseHook>,
    _marker: PhantomData<fn() -> O>,
}

impl<O: DeserializeOwned> CacheSubscription<O> {
    pub(crate) fn new(
        value_slot: SlotKey,
        status_slot: SlotKey,
        value_rx: watch::Receiver<SlotSnapshot>,
        status_rx: watch::Receiver<SlotSnapshot>,
        release: Option<ReleaseHook>,
    ) -> Self {
        Self {
            value_slot,
            status_slot,
            value_rx,
            status_rx,
            release,
            _marker: PhantomData,
        }
    }

    /// Current decrypted value, `None` when not loaded or cleared
    pub fn value(&self) -> VaultCacheResult<Option<RecordMap<O>>> {
        let snapshot = self.value_rx.borrow().clone();
        decode_snapshot(&self.value_slot, &snapshot)
    }

    /// Current decryption status; an unwritten slot reads as `cleared`
    pub fn status(&self) -> VaultCacheResult<DecryptionStatus> {
        let snapshot = self.status_rx.borrow().clone();
        Ok(decode_snapshot(&self.status_slot, &snapshot)?.unwrap_or_default())
    }

    /// Revision of the value cell currently observed
    pub fn value_revision(&self) -> u64 {
        self.value_rx.borrow().revision
    }

    /// Wait until the value or the status changes
    pub async fn changed(&mut self) -> VaultCacheResult<()> {
        let result = tokio::select! {
            r = self.value_rx.changed() => r,
            r = self.status_rx.changed() => r,
        };
        self.value_rx.borrow_and_update();
        self.status_rx.borrow_and_update();
        result.map_err(|_| VaultCacheError::Internal("state store dropped".to_string()))
    }

    /// Wait until the status satisfies `predicate`, up to `timeout`
    pub async fn wait_for_status(
        &mut self,
        timeout: Duration,
        predicate: impl Fn(DecryptionStatus) -> bool,
    ) -> VaultCacheResult<DecryptionStatus> {
        let slot = self.status_slot.clone();
        let wait = async {
            loop {
                let status = self.status()?;
                if predicate(status) {
                    return Ok::<_, VaultCacheError>(status);
                }
                self.status_rx
                    .changed()
                    .await
                    .map_err(|_| VaultCacheError::Internal("state store dropped".to_string()))?;
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            VaultCacheError::state(&slot, format!("status not reached within {:?}", timeout))
        })?
    }
}

impl<O> Drop for CacheSubscription<O> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
