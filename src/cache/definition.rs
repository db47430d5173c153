//! Cache definitions and keys

use crate::cache::decryptor::Decryptor;
use crate::cache::selector::{AlwaysUpdate, ShouldUpdate};
use crate::error::{VaultCacheError, VaultCacheResult};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Default delay before an unobserved cache tears down its driver
pub const DEFAULT_CLEANUP_DELAY: Duration = Duration::from_millis(1000);

const STATUS_SUFFIX: &str = "_status";

/// Unique name of one logical cache: a storage area plus a name within it.
///
/// Displays and parses as `area/name`, which is also the key carried in
/// remote request envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    area: String,
    name: String,
}

impl CacheKey {
    /// Create a key, rejecting empty parts and separators inside parts
    pub fn new(area: impl Into<String>, name: impl Into<String>) -> VaultCacheResult<Self> {
        let area = area.into();
        let name = name.into();

        for part in [&area, &name] {
            if part.is_empty() {
                return Err(VaultCacheError::InvalidCacheKey {
                    key: format!("{}/{}", area, name),
                    reason: "area and name must be non-empty".to_string(),
                });
            }
            if part.contains('/') {
                return Err(VaultCacheError::InvalidCacheKey {
                    key: format!("{}/{}", area, name),
                    reason: "area and name must not contain '/'".to_string(),
                });
            }
        }

        if name.ends_with(STATUS_SUFFIX) {
            return Err(VaultCacheError::InvalidCacheKey {
                key: format!("{}/{}", area, name),
                reason: format!("name must not end with {}", STATUS_SUFFIX),
            });
        }

        Ok(Self { area, name })
    }

    /// Storage area the cache's slots live in
    pub fn area(&self) -> &str {
        &self.area
    }

    /// Cache name within the area
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Slot name of the decrypted value
    pub fn value_slot(&self) -> String {
        self.name.clone()
    }

    /// Slot name of the decryption status
    pub fn status_slot(&self) -> String {
        format!("{}{}", self.name, STATUS_SUFFIX)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.area, self.name)
    }
}

impl FromStr for CacheKey {
    type Err = VaultCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (area, name) = s.split_once('/').ok_or_else(|| VaultCacheError::InvalidCacheKey {
            key: s.to_string(),
            reason: "expected area/name".to_string(),
        })?;
        Self::new(area, name)
    }
}

/// Identity and configuration of one cache
pub struct CacheDefinition<I, O> {
    key: CacheKey,
    should_update: Arc<dyn ShouldUpdate<I, O>>,
    decryptor: Option<Arc<dyn Decryptor<I, O>>>,
    cleanup_delay: Duration,
}

impl<I, O> CacheDefinition<I, O> {
    /// Create a definition with the default predicate and cleanup delay
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            should_update: Arc::new(AlwaysUpdate),
            decryptor: None,
            cleanup_delay: DEFAULT_CLEANUP_DELAY,
        }
    }

    /// Set the per-record change predicate
    pub fn with_should_update(mut self, predicate: impl ShouldUpdate<I, O> + 'static) -> Self {
        self.should_update = Arc::new(predicate);
        self
    }

    /// Set the decryptor used by local caches
    pub fn with_decryptor(mut self, decryptor: Arc<dyn Decryptor<I, O>>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    /// Set how long an unobserved cache keeps its driver alive
    pub fn with_cleanup_delay(mut self, delay: Duration) -> Self {
        self.cleanup_delay = delay;
        self
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    pub fn should_update(&self) -> Arc<dyn ShouldUpdate<I, O>> {
        Arc::clone(&self.should_update)
    }

    /// Decryptor, or `NoDecryptor` when none was configured
    pub fn decryptor(&self) -> VaultCacheResult<Arc<dyn Decryptor<I, O>>> {
        self.decryptor
            .clone()
            .ok_or_else(|| VaultCacheError::NoDecryptor(self.key.to_string()))
    }

    pub fn cleanup_delay(&self) -> Duration {
        self.cleanup_delay
    }
}

impl<I, O> Clone for CacheDefinition<I, O> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            should_update: Arc::clone(&self.should_update),
            decryptor: self.decryptor.clone(),
            cleanup_delay: self.cleanup_delay,
        }
    }
}

impl<I, O> fmt::Debug for CacheDefinition<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheDefinition")
            .field("key", &self.key)
            .field("has_decryptor", &self.decryptor.is_some())
            .field("cleanup_delay", &self.cleanup_delay)
            .finish()
    }
}
