//! Error types for vault-cache
//!
//! All modules use `VaultCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vault-cache operations
pub type VaultCacheResult<T> = Result<T, VaultCacheError>;

/// All errors that can occur in vault-cache
#[derive(Error, Debug)]
pub enum VaultCacheError {
    // Decryption errors
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("No decryptor configured for cache {0}")]
    NoDecryptor(String),

    // Remote errors
    #[error("Remote request {request_id} failed: {message}")]
    RemoteRequestFailed { request_id: String, message: String },

    #[error("Remote request {request_id} timed out after {timeout_ms}ms")]
    RemoteTimeout { request_id: String, timeout_ms: u64 },

    #[error("Remote channel closed: {0}")]
    RemoteChannelClosed(String),

    // Registry errors
    #[error("Cache registry has been shut down")]
    RegistryShutdown,

    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    #[error("Invalid cache key {key}: {reason}")]
    InvalidCacheKey { key: String, reason: String },

    // State errors
    #[error("State store error for slot {slot}: {reason}")]
    StateStore { slot: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl VaultCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a state store error for a slot
    pub fn state(slot: impl ToString, reason: impl Into<String>) -> Self {
        Self::StateStore {
            slot: slot.to_string(),
            reason: reason.into(),
        }
    }

    /// Message suitable for re-raising a decryption failure to other waiters
    ///
    /// Avoids stacking the "Decryption failed" prefix when the error already
    /// came from a decryptor.
    pub fn decryption_message(&self) -> String {
        match self {
            Self::DecryptionFailed(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Copy of this error for fanning out to several waiters.
    ///
    /// Variants carrying non-cloneable sources collapse to `Internal`.
    pub fn to_shared(&self) -> Self {
        match self {
            Self::DecryptionFailed(message) => Self::DecryptionFailed(message.clone()),
            Self::StateStore { slot, reason } => Self::StateStore {
                slot: slot.clone(),
                reason: reason.clone(),
            },
            Self::RemoteRequestFailed {
                request_id,
                message,
            } => Self::RemoteRequestFailed {
                request_id: request_id.clone(),
                message: message.clone(),
            },
            other => Self::Internal(other.to_string()),
        }
    }

    /// Check if error is retryable
    ///
    /// The cache never retries by itself; callers re-issue `decrypt()`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DecryptionFailed(_)
                | Self::RemoteRequestFailed { .. }
                | Self::RemoteTimeout { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::RemoteTimeout { .. } => {
                Some("Check that the decryption owner is running, or raise cache.remote_timeout_secs")
            }
            Self::ConfigInvalid { .. } => Some("Run: vault-cache config init --force"),
            Self::NoDecryptor(_) => Some("Local caches need a decryptor; use remote mode otherwise"),
            _ => None,
        }
    }
}
