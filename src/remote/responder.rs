//! Owner side of the vault-state protocol
//!
//! Runs in the context that holds the key material. Each request is resolved
//! against the owner's registry and answered with a completion envelope.

use crate::cache::definition::CacheKey;
use crate::cache::record::OutputRecord;
use crate::cache::registry::CacheRegistry;
use crate::error::{VaultCacheError, VaultCacheResult};
use crate::remote::channel::MessageSink;
use crate::remote::protocol::{UpdateVaultStateFinished, UpdateVaultStateRequest, VaultStateAction};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Answers remote proxies on behalf of the local caches in a registry
pub struct VaultStateResponder<O> {
    registry: Arc<CacheRegistry<O>>,
    outbound: Arc<dyn MessageSink<UpdateVaultStateFinished>>,
}

impl<O: OutputRecord> VaultStateResponder<O> {
    pub fn new(
        registry: Arc<CacheRegistry<O>>,
        outbound: Arc<dyn MessageSink<UpdateVaultStateFinished>>,
    ) -> Self {
        Self { registry, outbound }
    }

    /// Perform a request and build its completion
    pub async fn handle(&self, request: &UpdateVaultStateRequest) -> UpdateVaultStateFinished {
        match self.dispatch(request).await {
            Ok(()) => UpdateVaultStateFinished::success(&request.request_id),
            Err(e) => {
                debug!("Request {} failed: {}", request.request_id, e);
                UpdateVaultStateFinished::failure(&request.request_id, e.decryption_message())
            }
        }
    }

    /// Perform a request and send its completion
    pub async fn respond(&self, request: UpdateVaultStateRequest) -> VaultCacheResult<()> {
        let finished = self.handle(&request).await;
        self.outbound.send(finished).await
    }

    /// Answer requests from `inbound` until it closes.
    ///
    /// Requests are handled concurrently; each cache still serialises its own work.
    pub fn serve(
        self: Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<UpdateVaultStateRequest>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(request) = inbound.recv().await {
                let responder = Arc::clone(&self);
                tokio::spawn(async move {
                    let request_id = request.request_id.clone();
                    if let Err(e) = responder.respond(request).await {
                        warn!("Dropped completion for request {}: {}", request_id, e);
                    }
                });
            }
            debug!("Request channel closed");
        })
    }

    async fn dispatch(&self, request: &UpdateVaultStateRequest) -> VaultCacheResult<()> {
        let key: CacheKey = request.key.parse()?;
        let cache = self
            .registry
            .get(&key)
            .ok_or_else(|| VaultCacheError::CacheNotFound(request.key.clone()))?;

        match request.action {
            VaultStateAction::Decrypt => {
                let ignore_cache = request.clear_cache_before_decrypt.unwrap_or(false);
                cache.decrypt(ignore_cache).await.map(|_| ())
            }
            VaultStateAction::Clear => cache.clear().await,
        }
    }
}
