//! Encrypted input stream feeding a cache

use crate::cache::record::RecordMap;
use std::sync::Arc;
use tokio::sync::watch;

/// One published version of the encrypted records.
///
/// Revision 0 means nothing has been published yet, which is different from
/// a published `None` ("no records").
#[derive(Debug)]
pub struct InputSnapshot<I> {
    pub revision: u64,
    pub records: Option<Arc<RecordMap<I>>>,
}

impl<I> Clone for InputSnapshot<I> {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision,
            records: self.records.clone(),
        }
    }
}

impl<I> InputSnapshot<I> {
    /// Whether anything has been published
    pub fn is_published(&self) -> bool {
        self.revision > 0
    }
}

/// Publisher of encrypted record maps for one cache.
///
/// Cloning shares the same stream.
#[derive(Debug)]
pub struct EncryptedInput<I> {
    sender: watch::Sender<InputSnapshot<I>>,
}

impl<I> Clone for EncryptedInput<I> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<I> Default for EncryptedInput<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> EncryptedInput<I> {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(InputSnapshot {
            revision: 0,
            records: None,
        });
        Self { sender }
    }

    /// Publish a new snapshot and return its revision
    pub fn publish(&self, records: Option<RecordMap<I>>) -> u64 {
        let records = records.map(Arc::new);
        let mut revision = 0;
        self.sender.send_modify(|snapshot| {
            snapshot.revision += 1;
            snapshot.records = records;
            revision = snapshot.revision;
        });
        revision
    }

    /// Latest published snapshot
    pub fn current(&self) -> InputSnapshot<I> {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<InputSnapshot<I>> {
        self.sender.subscribe()
    }
}
