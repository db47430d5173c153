//! Request/response correlation for remote decryption
//!
//! Every outbound request registers a completion slot under its request id
//! before it is sent. Completions arriving on the inbound channel are routed
//! to their slot; unknown ids are dropped.

use crate::error::{VaultCacheError, VaultCacheResult};
use crate::remote::channel::MessageSink;
use crate::remote::protocol::{UpdateVaultStateFinished, UpdateVaultStateRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default bound on how long a request waits for its completion
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(30);

type PendingTable = HashMap<String, oneshot::Sender<UpdateVaultStateFinished>>;

/// Client side of the vault-state protocol, shared by all remote proxies
pub struct RemoteClient {
    outbound: Arc<dyn MessageSink<UpdateVaultStateRequest>>,
    pending: Mutex<PendingTable>,
    timeout: Option<Duration>,
}

impl RemoteClient {
    /// Create a client; `timeout` of `None` waits forever
    pub fn new(
        outbound: Arc<dyn MessageSink<UpdateVaultStateRequest>>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Send a request and wait for its matching completion
    pub async fn request(&self, request: UpdateVaultStateRequest) -> VaultCacheResult<()> {
        let request_id = request.request_id.clone();
        let (tx, rx) = oneshot::channel();
        self.lock_pending()?.insert(request_id.clone(), tx);

        debug!(
            "Sending {} request {} for {}",
            request.action, request_id, request.key
        );
        if let Err(e) = self.outbound.send(request).await {
            self.forget(&request_id);
            return Err(e);
        }

        let received = match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, rx).await {
                Ok(received) => received,
                Err(_) => {
                    self.forget(&request_id);
                    return Err(VaultCacheError::RemoteTimeout {
                        request_id,
                        timeout_ms: timeout_millis(timeout),
                    });
                }
            },
            None => rx.await,
        };

        let finished = received.map_err(|_| {
            VaultCacheError::RemoteChannelClosed(format!("request {} abandoned", request_id))
        })?;

        if finished.success {
            Ok(())
        } else {
            Err(VaultCacheError::RemoteRequestFailed {
                request_id,
                message: finished.error_message,
            })
        }
    }

    /// Route a completion to its waiting request. Returns false for unknown ids.
    pub fn complete(&self, finished: UpdateVaultStateFinished) -> bool {
        let waiter = match self.lock_pending() {
            Ok(mut pending) => pending.remove(&finished.request_id),
            Err(_) => None,
        };

        match waiter {
            Some(waiter) => waiter.send(finished).is_ok(),
            None => {
                debug!(
                    "Ignoring completion for unknown request {}",
                    finished.request_id
                );
                false
            }
        }
    }

    /// Route completions from `inbound` until it closes, then fail what is left
    pub fn listen(
        self: &Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<UpdateVaultStateFinished>,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(finished) = inbound.recv().await {
                client.complete(finished);
            }
            debug!("Completion channel closed");
            client.close();
        })
    }

    /// Fail every pending request
    pub fn close(&self) {
        if let Ok(mut pending) = self.lock_pending() {
            pending.clear();
        }
    }

    /// Requests still waiting for a completion
    pub fn pending_count(&self) -> usize {
        self.lock_pending().map(|p| p.len()).unwrap_or(0)
    }

    fn forget(&self, request_id: &str) {
        if let Ok(mut pending) = self.lock_pending() {
            pending.remove(request_id);
        }
    }

    fn lock_pending(&self) -> VaultCacheResult<MutexGuard<'_, PendingTable>> {
        self.pending
            .lock()
            .map_err(|_| VaultCacheError::Internal("pending request table poisoned".to_string()))
    }
}

/// Milliseconds in `timeout`, saturating at `u64::MAX`
fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
