//! Composition root for caches
//!
//! The provider decides once, at construction, whether caches decrypt here
//! or proxy to a remote owner. Consumers only see `VaultCache` handles.

use crate::cache::definition::CacheDefinition;
use crate::cache::input::EncryptedInput;
use crate::cache::local::LocalVaultCache;
use crate::cache::record::{InputRecord, OutputRecord};
use crate::cache::registry::{CacheHandle, CacheRegistry};
use crate::error::VaultCacheResult;
use crate::remote::client::RemoteClient;
use crate::remote::proxy::RemoteVaultCache;
use crate::state::StateStore;
use std::sync::Arc;

/// Where decryption happens for caches built by a provider
#[derive(Clone)]
pub enum ExecutionContext {
    /// Key material is available here
    Local,
    /// Requests go to the owner through this client
    Remote(Arc<RemoteClient>),
}

impl ExecutionContext {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionContext::Local => "local",
            ExecutionContext::Remote(_) => "remote",
        }
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds and hands out cache instances for one user session
pub struct VaultCacheProvider<O> {
    registry: Arc<CacheRegistry<O>>,
    store: Arc<dyn StateStore>,
    user: String,
    context: ExecutionContext,
}

impl<O: OutputRecord> VaultCacheProvider<O> {
    pub fn new(store: Arc<dyn StateStore>, user: impl Into<String>, context: ExecutionContext) -> Self {
        Self::with_registry(Arc::new(CacheRegistry::new()), store, user, context)
    }

    /// Share an existing registry, e.g. with a `VaultStateResponder`
    pub fn with_registry(
        registry: Arc<CacheRegistry<O>>,
        store: Arc<dyn StateStore>,
        user: impl Into<String>,
        context: ExecutionContext,
    ) -> Self {
        Self {
            registry,
            store,
            user: user.into(),
            context,
        }
    }

    pub fn registry(&self) -> &Arc<CacheRegistry<O>> {
        &self.registry
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// The cache for `definition`, created on first request.
    ///
    /// `input` is only consulted in local mode, and only when the instance
    /// is first built.
    pub fn cache<I: InputRecord>(
        &self,
        definition: &CacheDefinition<I, O>,
        input: &EncryptedInput<I>,
    ) -> VaultCacheResult<CacheHandle<O>> {
        self.registry.get_or_create(definition.key(), || {
            let cache: CacheHandle<O> = match &self.context {
                ExecutionContext::Local => Arc::new(LocalVaultCache::new(
                    definition,
                    input.clone(),
                    Arc::clone(&self.store),
                    &self.user,
                )?),
                ExecutionContext::Remote(client) => Arc::new(RemoteVaultCache::new(
                    definition.key().clone(),
                    Arc::clone(&self.store),
                    &self.user,
                    Arc::clone(client),
                )),
            };
            Ok(cache)
        })
    }

    /// Stop all caches built by this provider
    pub async fn shutdown(&self) {
        self.registry.shutdown().await;
    }
}
