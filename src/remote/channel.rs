//! Outbound message channel abstraction

use crate::error::{VaultCacheError, VaultCacheResult};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Outbound half of an application-internal message channel
#[async_trait]
pub trait MessageSink<M>: Send + Sync {
    async fn send(&self, message: M) -> VaultCacheResult<()>;
}

/// Sink backed by an in-process tokio channel
pub struct ChannelSink<M> {
    tx: mpsc::UnboundedSender<M>,
}

#[async_trait]
impl<M: Send + 'static> MessageSink<M> for ChannelSink<M> {
    async fn send(&self, message: M) -> VaultCacheResult<()> {
        self.tx
            .send(message)
            .map_err(|_| VaultCacheError::RemoteChannelClosed("receiver dropped".to_string()))
    }
}

/// Create an in-process channel: a sink and the receiver on the other side
pub fn message_channel<M: Send + 'static>() -> (ChannelSink<M>, mpsc::UnboundedReceiver<M>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}
