//! Decryption session contract
//!
//! The cache never knows how records are decrypted. It hands the decryptor
//! exactly the subset that changed and merges whatever comes back.

use crate::error::VaultCacheResult;
use async_trait::async_trait;

/// Asynchronous, fallible decryption of a batch of records
#[async_trait]
pub trait Decryptor<I, O>: Send + Sync {
    /// Decrypt `records`. Output order does not matter; results are keyed by id.
    async fn decrypt(&self, records: Vec<I>) -> VaultCacheResult<Vec<O>>;
}
