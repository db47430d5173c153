//! In-process state store

use crate::error::VaultCacheResult;
use crate::state::{SlotChannels, SlotKey, SlotSnapshot, StateStore};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// State store kept entirely in memory.
///
/// Two execution contexts inside one process can share an instance as the
/// mirror between a decryption owner and its remote proxies.
#[derive(Default)]
pub struct MemoryStateStore {
    channels: SlotChannels,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, slot: &SlotKey) -> VaultCacheResult<SlotSnapshot> {
        let sender = self.channels.sender(slot, SlotSnapshot::default)?;
        let snapshot = sender.borrow().clone();
        Ok(snapshot)
    }

    async fn update(&self, slot: &SlotKey, value: Option<Value>) -> VaultCacheResult<u64> {
        let sender = self.channels.sender(slot, SlotSnapshot::default)?;
        let mut revision = 0;
        sender.send_modify(|snapshot| {
            snapshot.revision += 1;
            snapshot.value = value.map(Arc::new);
            revision = snapshot.revision;
        });
        Ok(revision)
    }

    async fn watch(&self, slot: &SlotKey) -> VaultCacheResult<watch::Receiver<SlotSnapshot>> {
        let sender = self.channels.sender(slot, SlotSnapshot::default)?;
        Ok(sender.subscribe())
    }
}
