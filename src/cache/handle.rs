//! Cache handle abstraction
//!
//! Provides the contract shared by both deployment topologies:
//! - Local: decryption runs in the same context as the cache
//! - Remote: decryption is requested from a privileged owner over a channel

use crate::cache::definition::CacheKey;
use crate::cache::record::RecordMap;
use crate::cache::status::DecryptionStatus;
use crate::cache::subscription::CacheSubscription;
use crate::error::VaultCacheResult;
use async_trait::async_trait;

/// Abstract decrypted-record cache
#[async_trait]
pub trait VaultCache<O>: Send + Sync {
    /// Definition key this instance was created for
    fn key(&self) -> &CacheKey;

    /// Human-readable topology name for display
    fn mode_name(&self) -> &'static str;

    /// Current persisted value
    async fn value(&self) -> VaultCacheResult<Option<RecordMap<O>>>;

    /// Current persisted status
    async fn status(&self) -> VaultCacheResult<DecryptionStatus>;

    /// Observe value and status. Local caches stay active while observed.
    async fn subscribe(&self) -> VaultCacheResult<CacheSubscription<O>>;

    /// Bring the value up to date with the latest input and return it.
    ///
    /// With `ignore_cache`, every record is decrypted again.
    async fn decrypt(&self, ignore_cache: bool) -> VaultCacheResult<Option<RecordMap<O>>>;

    /// Reset the value to `None` and the status to `cleared`
    async fn clear(&self) -> VaultCacheResult<()>;

    /// Stop background work; persisted cells are kept
    async fn shutdown(&self);
}
