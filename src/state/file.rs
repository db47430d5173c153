//! Durable state store backed by JSON files
//!
//! Layout: `<root>/<area>/<sha256(user)>/<slot>.json`. User ids are hashed so
//! that account identifiers never appear in paths.

use crate::error::{VaultCacheError, VaultCacheResult};
use crate::state::{publish, SlotChannels, SlotKey, SlotSnapshot, StateStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// On-disk form of a slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotFile {
    /// Monotonic revision, continued across restarts
    pub revision: u64,

    /// When the slot was last written
    pub updated_at: DateTime<Utc>,

    /// Slot contents; `null` when cleared
    pub value: Option<Value>,
}

/// State store persisting every slot as a JSON document
pub struct FileStateStore {
    root: PathBuf,
    channels: SlotChannels,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    /// Open (and create) a store rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> VaultCacheResult<Self> {
        let root = root.into();
        create_private_dir(&root).await?;
        Ok(Self {
            root,
            channels: SlotChannels::default(),
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the JSON file backing a slot
    pub fn slot_path(&self, slot: &SlotKey) -> VaultCacheResult<PathBuf> {
        validate_component(slot, &slot.area)?;
        validate_component(slot, &slot.name)?;
        Ok(self
            .root
            .join(&slot.area)
            .join(user_dir(&slot.user))
            .join(format!("{}.json", slot.name)))
    }

    /// Read the on-disk record of a slot, if any
    pub async fn read_file(&self, slot: &SlotKey) -> VaultCacheResult<Option<SlotFile>> {
        let path = self.slot_path(slot)?;
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| VaultCacheError::io(format!("reading slot file {}", path.display()), e))?;

        let file: SlotFile = serde_json::from_str(&content)
            .map_err(|e| VaultCacheError::state(slot, format!("corrupt slot file: {}", e)))?;
        Ok(Some(file))
    }

    async fn sender(&self, slot: &SlotKey) -> VaultCacheResult<watch::Sender<SlotSnapshot>> {
        if self.channels.contains(slot) {
            return self.channels.sender(slot, SlotSnapshot::default);
        }

        let seed = match self.read_file(slot).await? {
            Some(file) => SlotSnapshot {
                revision: file.revision,
                value: file.value.map(Arc::new),
            },
            None => SlotSnapshot::default(),
        };
        self.channels.sender(slot, move || seed)
    }

    async fn write_file(&self, slot: &SlotKey, file: &SlotFile) -> VaultCacheResult<()> {
        let path = self.slot_path(slot)?;
        if let Some(parent) = path.parent() {
            create_private_dir(parent).await?;
        }

        let content = serde_json::to_string_pretty(file)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| VaultCacheError::io(format!("writing slot file {}", tmp.display()), e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp, perms)
                .map_err(|e| VaultCacheError::io("setting slot file permissions", e))?;
        }

        fs::rename(&tmp, &path)
            .await
            .map_err(|e| VaultCacheError::io(format!("replacing slot file {}", path.display()), e))?;

        debug!("Persisted slot {} at revision {}", slot, file.revision);
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, slot: &SlotKey) -> VaultCacheResult<SlotSnapshot> {
        let sender = self.sender(slot).await?;
        let snapshot = sender.borrow().clone();
        Ok(snapshot)
    }

    async fn update(&self, slot: &SlotKey, value: Option<Value>) -> VaultCacheResult<u64> {
        let _guard = self.write_lock.lock().await;

        let sender = self.sender(slot).await?;
        let revision = sender.borrow().revision + 1;

        let file = SlotFile {
            revision,
            updated_at: Utc::now(),
            value,
        };
        self.write_file(slot, &file).await?;

        publish(&sender, revision, file.value);
        Ok(revision)
    }

    async fn watch(&self, slot: &SlotKey) -> VaultCacheResult<watch::Receiver<SlotSnapshot>> {
        Ok(self.sender(slot).await?.subscribe())
    }
}

fn user_dir(user: &str) -> String {
    hex::encode(Sha256::digest(user.as_bytes()))
}

fn validate_component(slot: &SlotKey, part: &str) -> VaultCacheResult<()> {
    let invalid = part.is_empty()
        || part == "."
        || part == ".."
        || part.contains(['/', '\\'])
        || part.contains('\0');
    if invalid {
        return Err(VaultCacheError::state(
            slot,
            format!("invalid path component: {:?}", part),
        ));
    }
    Ok(())
}

async fn create_private_dir(path: &Path) -> VaultCacheResult<()> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| VaultCacheError::io(format!("creating state directory {}", path.display()), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        std::fs::set_permissions(path, perms)
            .map_err(|e| VaultCacheError::io("setting state directory permissions", e))?;
    }

    Ok(())
}
