//! Envelopes exchanged between a remote proxy and the decryption owner

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Work the owner is asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStateAction {
    Decrypt,
    Clear,
}

impl fmt::Display for VaultStateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decrypt => f.write_str("decrypt"),
            Self::Clear => f.write_str("clear"),
        }
    }
}

/// Request sent from a proxy to the owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVaultStateRequest {
    /// Cache definition key, `area/name`
    pub key: String,

    pub action: VaultStateAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clear_cache_before_decrypt: Option<bool>,

    /// Correlates the matching completion
    pub request_id: String,
}

impl UpdateVaultStateRequest {
    /// Decrypt request with a fresh request id
    pub fn decrypt(key: impl Into<String>, clear_cache_before_decrypt: bool) -> Self {
        Self {
            key: key.into(),
            action: VaultStateAction::Decrypt,
            clear_cache_before_decrypt: Some(clear_cache_before_decrypt),
            request_id: Uuid::new_v4().to_string(),
        }
    }

    /// Clear request with a fresh request id
    pub fn clear(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            action: VaultStateAction::Clear,
            clear_cache_before_decrypt: None,
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

/// Completion sent from the owner back to the proxy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVaultStateFinished {
    pub request_id: String,
    pub success: bool,
    #[serde(default)]
    pub error_message: String,
}

impl UpdateVaultStateFinished {
    pub fn success(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: true,
            error_message: String::new(),
        }
    }

    pub fn failure(request_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            success: false,
            error_message: error_message.into(),
        }
    }
}

/// Either envelope, tagged by `command` for a shared application channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum VaultMessage {
    UpdateVaultStateRequest(UpdateVaultStateRequest),
    UpdateVaultStateFinished(UpdateVaultStateFinished),
}
