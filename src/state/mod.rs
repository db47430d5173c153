//! Persisted, user-scoped key-value slots
//!
//! Each cache owns two slots in its storage area: the decrypted value and the
//! decryption status. Stores notify watchers on every update so that engines
//! and mirrored proxies observe writes made elsewhere.

pub mod file;
pub mod memory;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

use crate::error::{VaultCacheError, VaultCacheResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Address of one slot: storage area, owning user, slot name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub area: String,
    pub user: String,
    pub name: String,
}

impl SlotKey {
    pub fn new(area: impl Into<String>, user: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            user: user.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.area, self.name, self.user)
    }
}

/// Contents of a slot at one revision.
///
/// Revision 0 means the slot has never been written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotSnapshot {
    pub revision: u64,
    pub value: Option<Arc<Value>>,
}

/// Persisted key-value store with change notification
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read the current snapshot of a slot
    async fn get(&self, slot: &SlotKey) -> VaultCacheResult<SlotSnapshot>;

    /// Replace a slot's value and return the new revision
    async fn update(&self, slot: &SlotKey, value: Option<Value>) -> VaultCacheResult<u64>;

    /// Observe a slot; the receiver starts at the current snapshot
    async fn watch(&self, slot: &SlotKey) -> VaultCacheResult<watch::Receiver<SlotSnapshot>>;
}

/// Per-slot watch channels shared by the store implementations
#[derive(Default)]
pub(crate) struct SlotChannels {
    slots: Mutex<HashMap<SlotKey, watch::Sender<SlotSnapshot>>>,
}

impl SlotChannels {
    /// Sender for a slot, seeding it with `seed` on first use
    pub(crate) fn sender(
        &self,
        slot: &SlotKey,
        seed: impl FnOnce() -> SlotSnapshot,
    ) -> VaultCacheResult<watch::Sender<SlotSnapshot>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| VaultCacheError::state(slot, "slot table poisoned"))?;
        let sender = slots
            .entry(slot.clone())
            .or_insert_with(|| watch::channel(seed()).0);
        Ok(sender.clone())
    }

    /// Whether the slot is already tracked in memory
    pub(crate) fn contains(&self, slot: &SlotKey) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.contains_key(slot))
            .unwrap_or(false)
    }
}

/// Bump a sender's revision to `revision` with `value` and notify watchers
pub(crate) fn publish(sender: &watch::Sender<SlotSnapshot>, revision: u64, value: Option<Value>) {
    sender.send_replace(SlotSnapshot {
        revision,
        value: value.map(Arc::new),
    });
}

/// Typed view over one slot
pub struct StateCell<T> {
    store: Arc<dyn StateStore>,
    slot: SlotKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            slot: self.slot.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> StateCell<T> {
    pub fn new(store: Arc<dyn StateStore>, slot: SlotKey) -> Self {
        Self {
            store,
            slot,
            _marker: PhantomData,
        }
    }

    pub fn slot(&self) -> &SlotKey {
        &self.slot
    }

    /// Current typed value
    pub async fn get(&self) -> VaultCacheResult<Option<T>> {
        let snapshot = self.store.get(&self.slot).await?;
        self.decode(&snapshot)
    }

    /// Write a value (or `None`) and return the new revision
    pub async fn set(&self, value: Option<&T>) -> VaultCacheResult<u64> {
        let value = value.map(serde_json::to_value).transpose()?;
        self.store.update(&self.slot, value).await
    }

    /// Watch raw snapshots of the slot
    pub async fn watch(&self) -> VaultCacheResult<watch::Receiver<SlotSnapshot>> {
        self.store.watch(&self.slot).await
    }

    /// Decode a snapshot of this slot
    pub fn decode(&self, snapshot: &SlotSnapshot) -> VaultCacheResult<Option<T>> {
        decode_snapshot(&self.slot, snapshot)
    }
}

pub(crate) fn decode_snapshot<T: DeserializeOwned>(
    slot: &SlotKey,
    snapshot: &SlotSnapshot,
) -> VaultCacheResult<Option<T>> {
    match snapshot.value.as_deref() {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|e| VaultCacheError::state(slot, format!("decoding value: {}", e))),
    }
}
