//! vault-cache - incremental decrypted-record cache
//!
//! Keeps a persisted map of decrypted records in sync with a stream of
//! encrypted inputs, re-decrypting only what changed. Decryption runs either
//! in the current context or in a privileged owner reached over a
//! request/response channel.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod state;
pub mod ui;

pub use error::{VaultCacheError, VaultCacheResult};
