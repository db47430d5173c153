//! Configuration schema for vault-cache
//!
//! Configuration is stored at `~/.config/vault-cache/config.toml`

use crate::cache::{CacheDefinition, CacheKey};
use crate::remote::{MessageSink, RemoteClient, UpdateVaultStateRequest};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache engine settings
    pub cache: CacheConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Cache engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Idle time before an unobserved cache stops its driver
    pub cleanup_delay_ms: u64,

    /// Bound on remote requests in seconds (0 = wait forever)
    pub remote_timeout_secs: u64,

    /// Override for the state directory
    pub state_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cleanup_delay_ms: 1000,
            remote_timeout_secs: 30,
            state_dir: None,
        }
    }
}

impl CacheConfig {
    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.cleanup_delay_ms)
    }

    /// Remote request timeout; `None` when disabled
    pub fn remote_timeout(&self) -> Option<Duration> {
        match self.remote_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Definition for `key` carrying the configured cleanup delay
    pub fn definition<I, O>(&self, key: CacheKey) -> CacheDefinition<I, O> {
        CacheDefinition::new(key).with_cleanup_delay(self.cleanup_delay())
    }

    /// Remote client bounded by the configured timeout
    pub fn remote_client(
        &self,
        outbound: Arc<dyn MessageSink<UpdateVaultStateRequest>>,
    ) -> RemoteClient {
        RemoteClient::new(outbound, self.remote_timeout())
    }
}
