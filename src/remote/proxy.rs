//! Remote cache proxy
//!
//! Holds no decryption capability. Work is requested from the owner over the
//! message channel; results are read from cells mirrored into this context.

use crate::cache::cells::CacheCells;
use crate::cache::definition::CacheKey;
use crate::cache::handle::VaultCache;
use crate::cache::record::{OutputRecord, RecordMap};
use crate::cache::status::DecryptionStatus;
use crate::cache::subscription::CacheSubscription;
use crate::error::VaultCacheResult;
use crate::remote::client::RemoteClient;
use crate::remote::protocol::UpdateVaultStateRequest;
use crate::state::StateStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Cache whose decryption owner lives in another execution context
pub struct RemoteVaultCache<O> {
    key: CacheKey,
    cells: CacheCells<O>,
    client: Arc<RemoteClient>,
}

impl<O: OutputRecord> RemoteVaultCache<O> {
    pub fn new(
        key: CacheKey,
        store: Arc<dyn StateStore>,
        user: &str,
        client: Arc<RemoteClient>,
    ) -> Self {
        let cells = CacheCells::new(store, &key, user);
        Self { key, cells, client }
    }
}

#[async_trait]
impl<O: OutputRecord> VaultCache<O> for RemoteVaultCache<O> {
    fn key(&self) -> &CacheKey {
        &self.key
    }

    fn mode_name(&self) -> &'static str {
        "remote"
    }

    async fn value(&self) -> VaultCacheResult<Option<RecordMap<O>>> {
        self.cells.value.get().await
    }

    async fn status(&self) -> VaultCacheResult<DecryptionStatus> {
        self.cells.status().await
    }

    async fn subscribe(&self) -> VaultCacheResult<CacheSubscription<O>> {
        self.cells.subscribe(None).await
    }

    async fn decrypt(&self, ignore_cache: bool) -> VaultCacheResult<Option<RecordMap<O>>> {
        let request = UpdateVaultStateRequest::decrypt(self.key.to_string(), ignore_cache);
        self.client.request(request).await?;
        self.cells.value.get().await
    }

    async fn clear(&self) -> VaultCacheResult<()> {
        let request = UpdateVaultStateRequest::clear(self.key.to_string());
        self.client.request(request).await
    }

    async fn shutdown(&self) {}
}
