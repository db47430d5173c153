//! Local cache engine
//!
//! Each cache runs a single driver task that owns the decryption status and
//! serialises every event touching the cache: new input, external writes to
//! the value cell, finished decryption passes, and caller requests.
//!
//! # Passes
//!
//! A pass selects the records that changed since the persisted value and
//! hands exactly those to the decryptor. At most one pass is in flight. A
//! newer input, a `clear()`, or an external write to the value cell
//! supersedes it: the pending future is dropped and its result never lands.
//!
//! # Lifetime
//!
//! The driver starts on first use and exits once nobody has been subscribed
//! for the definition's cleanup delay. Persisted cells outlive it; the next
//! access starts a fresh driver.

use crate::cache::cells::CacheCells;
use crate::cache::decryptor::Decryptor;
use crate::cache::definition::{CacheDefinition, CacheKey};
use crate::cache::handle::VaultCache;
use crate::cache::input::{EncryptedInput, InputSnapshot};
use crate::cache::record::{InputRecord, OutputRecord, RecordMap};
use crate::cache::selector::{merge_decrypted, select, Selection, ShouldUpdate};
use crate::cache::status::{DecryptionStatus, StatusEvent};
use crate::cache::subscription::CacheSubscription;
use crate::error::{VaultCacheError, VaultCacheResult};
use crate::state::{SlotSnapshot, StateStore};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

type Reply<T> = oneshot::Sender<VaultCacheResult<T>>;
type PassWork<O> = Pin<Box<dyn Future<Output = VaultCacheResult<Vec<O>>> + Send>>;

enum Command<O> {
    Decrypt {
        ignore_cache: bool,
        reply: Reply<Option<RecordMap<O>>>,
    },
    Clear {
        reply: Reply<()>,
    },
    Attached,
    Released,
    Shutdown,
}

/// Cache that decrypts in the current execution context
pub struct LocalVaultCache<I, O> {
    shared: Arc<Shared<I, O>>,
}

impl<I, O> Clone for LocalVaultCache<I, O> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<I, O> {
    key: CacheKey,
    should_update: Arc<dyn ShouldUpdate<I, O>>,
    decryptor: Arc<dyn Decryptor<I, O>>,
    cleanup_delay: Duration,
    input: EncryptedInput<I>,
    cells: CacheCells<O>,
    subscribers: AtomicUsize,
    /// Input revision whose pass last succeeded; 0 when none
    settled_revision: AtomicU64,
    driver: Mutex<Option<mpsc::UnboundedSender<Command<O>>>>,
}

impl<I: InputRecord, O: OutputRecord> LocalVaultCache<I, O> {
    /// Create a cache reading `input` and persisting into `store` for `user`
    pub fn new(
        definition: &CacheDefinition<I, O>,
        input: EncryptedInput<I>,
        store: Arc<dyn StateStore>,
        user: &str,
    ) -> VaultCacheResult<Self> {
        let shared = Shared {
            key: definition.key().clone(),
            should_update: definition.should_update(),
            decryptor: definition.decryptor()?,
            cleanup_delay: definition.cleanup_delay(),
            input,
            cells: CacheCells::new(store, definition.key(), user),
            subscribers: AtomicUsize::new(0),
            settled_revision: AtomicU64::new(0),
            driver: Mutex::new(None),
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// Whether the driver task is currently running
    pub fn is_active(&self) -> bool {
        self.shared
            .driver
            .lock()
            .map(|driver| driver.as_ref().is_some_and(|tx| !tx.is_closed()))
            .unwrap_or(false)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.load(Ordering::SeqCst)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command<O>,
    ) -> VaultCacheResult<T> {
        let (tx, rx) = oneshot::channel();
        self.shared.send(build(tx), true)?;
        rx.await.map_err(|_| {
            VaultCacheError::Internal(format!("cache {} stopped before replying", self.shared.key))
        })?
    }
}

impl<I: InputRecord, O: OutputRecord> Shared<I, O> {
    /// Deliver a command, starting the driver when `spawn` is set.
    ///
    /// Runs under the driver lock so a retiring driver never drops a command.
    fn send(self: &Arc<Self>, command: Command<O>, spawn: bool) -> VaultCacheResult<()> {
        let mut driver = self
            .driver
            .lock()
            .map_err(|_| VaultCacheError::Internal("driver lock poisoned".to_string()))?;

        if let Some(tx) = driver.as_ref() {
            if !tx.is_closed() {
                return tx.send(command).map_err(|_| {
                    VaultCacheError::Internal(format!("cache {} driver stopped", self.key))
                });
            }
        }

        if !spawn {
            *driver = None;
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(command)
            .map_err(|_| VaultCacheError::Internal("driver channel closed".to_string()))?;
        *driver = Some(tx);

        debug!("Starting driver for cache {}", self.key);
        tokio::spawn(Driver::run(Arc::clone(self), rx));
        Ok(())
    }

    fn settled_revision(&self) -> u64 {
        self.settled_revision.load(Ordering::SeqCst)
    }

    fn mark_settled(&self, revision: u64) {
        self.settled_revision.store(revision, Ordering::SeqCst);
    }
}

struct Pass<O> {
    generation: u64,
    input_revision: u64,
    carry_over: RecordMap<O>,
    waiters: Vec<Reply<Option<RecordMap<O>>>>,
    work: PassWork<O>,
}

enum Event<O> {
    Command(Option<Command<O>>),
    InputChanged,
    InputClosed,
    ValueChanged,
    StoreClosed,
    PassFinished(VaultCacheResult<Vec<O>>),
    IdleTimeout,
}

struct Driver<I, O> {
    shared: Arc<Shared<I, O>>,
    commands: mpsc::UnboundedReceiver<Command<O>>,
    input_rx: watch::Receiver<InputSnapshot<I>>,
    input_open: bool,
    value_rx: watch::Receiver<SlotSnapshot>,
    own_value_revision: u64,
    status: DecryptionStatus,
    generation: u64,
    pass: Option<Pass<O>>,
    idle_deadline: Option<Instant>,
}

impl<I: InputRecord, O: OutputRecord> Driver<I, O> {
    async fn run(shared: Arc<Shared<I, O>>, commands: mpsc::UnboundedReceiver<Command<O>>) {
        let value_rx = match shared.cells.value.watch().await {
            Ok(rx) => rx,
            Err(e) => {
                warn!("Cache {} cannot watch its value cell: {}", shared.key, e);
                return;
            }
        };
        let status = match shared.cells.status().await {
            Ok(status) => status,
            Err(e) => {
                warn!("Cache {} has an unreadable status cell: {}", shared.key, e);
                DecryptionStatus::default()
            }
        };

        let own_value_revision = value_rx.borrow().revision;
        let mut driver = Driver {
            input_rx: shared.input.subscribe(),
            input_open: true,
            own_value_revision,
            value_rx,
            status,
            generation: 0,
            pass: None,
            idle_deadline: None,
            commands,
            shared,
        };

        let snapshot = driver.input_rx.borrow_and_update().clone();
        if snapshot.is_published() && snapshot.revision != driver.shared.settled_revision() {
            driver.start_pass(snapshot, false, Vec::new()).await;
        }
        driver.refresh_idle();

        loop {
            match driver.next_event().await {
                Event::Command(None) | Event::Command(Some(Command::Shutdown)) => break,
                Event::Command(Some(command)) => driver.handle_command(command).await,
                Event::InputChanged => {
                    let snapshot = driver.input_rx.borrow_and_update().clone();
                    driver.start_pass(snapshot, false, Vec::new()).await;
                }
                Event::InputClosed => driver.input_open = false,
                Event::ValueChanged => driver.handle_value_changed().await,
                Event::StoreClosed => break,
                Event::PassFinished(result) => driver.handle_pass_finished(result).await,
                Event::IdleTimeout => {
                    if driver.try_retire() {
                        debug!("Evicted idle cache driver {}", driver.shared.key);
                        return;
                    }
                }
            }
            driver.refresh_idle();
        }

        if let Ok(mut slot) = driver.shared.driver.lock() {
            *slot = None;
        }
        debug!("Stopped cache driver {}", driver.shared.key);
    }

    async fn next_event(&mut self) -> Event<O> {
        let commands = &mut self.commands;
        let value_rx = &mut self.value_rx;
        let input_rx = &mut self.input_rx;
        let input_open = self.input_open;
        let pass = &mut self.pass;
        let idle_deadline = self.idle_deadline;

        tokio::select! {
            biased;

            command = commands.recv() => Event::Command(command),
            changed = value_rx.changed() => match changed {
                Ok(()) => Event::ValueChanged,
                Err(_) => Event::StoreClosed,
            },
            changed = input_rx.changed(), if input_open => match changed {
                Ok(()) => Event::InputChanged,
                Err(_) => Event::InputClosed,
            },
            result = async {
                match pass.as_mut() {
                    Some(pass) => pass.work.as_mut().await,
                    None => std::future::pending().await,
                }
            } => Event::PassFinished(result),
            _ = async {
                match idle_deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            } => Event::IdleTimeout,
        }
    }

    async fn handle_command(&mut self, command: Command<O>) {
        match command {
            Command::Decrypt {
                ignore_cache,
                reply,
            } => self.handle_decrypt(ignore_cache, reply).await,
            Command::Clear { reply } => {
                let result = self.clear().await;
                let _ = reply.send(result);
            }
            Command::Attached | Command::Released | Command::Shutdown => {}
        }
    }

    async fn handle_decrypt(&mut self, ignore_cache: bool, reply: Reply<Option<RecordMap<O>>>) {
        let snapshot = self.input_rx.borrow_and_update().clone();

        if !snapshot.is_published() {
            let _ = reply.send(self.shared.cells.value.get().await);
            return;
        }

        if !ignore_cache {
            if let Some(pass) = self.pass.as_mut() {
                if pass.input_revision == snapshot.revision {
                    pass.waiters.push(reply);
                    return;
                }
            }
            if self.pass.is_none() && self.shared.settled_revision() == snapshot.revision {
                let _ = reply.send(self.shared.cells.value.get().await);
                return;
            }
        }

        self.start_pass(snapshot, ignore_cache, vec![reply]).await;
    }

    /// Start processing `snapshot`, superseding any pass in flight
    async fn start_pass(
        &mut self,
        snapshot: InputSnapshot<I>,
        ignore_cache: bool,
        mut waiters: Vec<Reply<Option<RecordMap<O>>>>,
    ) {
        if let Some(stale) = self.pass.take() {
            debug!(
                "Pass {} of cache {} superseded by input revision {}",
                stale.generation, self.shared.key, snapshot.revision
            );
            waiters.extend(stale.waiters);
        }

        let previous = match &snapshot.records {
            Some(_) if !ignore_cache => self.shared.cells.value.get().await,
            _ => Ok(None),
        };
        let previous = match previous {
            Ok(previous) => previous,
            Err(e) => {
                self.fail(waiters, e).await;
                return;
            }
        };

        let selection = select(
            previous.as_ref(),
            snapshot.records.as_deref(),
            self.shared.should_update.as_ref(),
        );

        match selection {
            None => {
                // No records: output is null. Status is untouched unless a
                // superseded pass left it in_progress.
                if self.status.is_pending() {
                    if let Err(e) = self
                        .set_status(StatusEvent::Superseded { has_value: false })
                        .await
                    {
                        warn!("Cache {} failed to update status: {}", self.shared.key, e);
                    }
                }
                let result = self.write_value(None).await.map(|()| None);
                if result.is_ok() {
                    self.shared.mark_settled(snapshot.revision);
                }
                reply_all(waiters, result);
            }
            Some(selection) if selection.is_settled() => {
                debug!(
                    "Cache {} input revision {} needs no decryption",
                    self.shared.key, snapshot.revision
                );
                let value = selection.merge(Vec::new());
                self.succeed(snapshot.revision, value, waiters).await;
            }
            Some(Selection {
                needs_decrypt,
                carry_over,
            }) => {
                self.generation += 1;
                debug!(
                    "Pass {} of cache {}: decrypting {} records, reusing {}",
                    self.generation,
                    self.shared.key,
                    needs_decrypt.len(),
                    carry_over.len()
                );

                if let Err(e) = self.set_status(StatusEvent::PassStarted).await {
                    self.fail(waiters, e).await;
                    return;
                }

                let decryptor = Arc::clone(&self.shared.decryptor);
                self.pass = Some(Pass {
                    generation: self.generation,
                    input_revision: snapshot.revision,
                    carry_over,
                    waiters,
                    work: Box::pin(async move { decryptor.decrypt(needs_decrypt).await }),
                });
            }
        }
    }

    async fn handle_pass_finished(&mut self, result: VaultCacheResult<Vec<O>>) {
        let Some(pass) = self.pass.take() else {
            return;
        };

        match result {
            Ok(decrypted) => {
                let value = merge_decrypted(pass.carry_over, decrypted);
                self.succeed(pass.input_revision, value, pass.waiters).await;
            }
            Err(e) => {
                debug!(
                    "Pass {} of cache {} failed: {}",
                    pass.generation, self.shared.key, e
                );
                let error = VaultCacheError::DecryptionFailed(e.decryption_message());
                self.fail(pass.waiters, error).await;
            }
        }
    }

    async fn handle_value_changed(&mut self) {
        let snapshot = self.value_rx.borrow_and_update().clone();
        if snapshot.revision <= self.own_value_revision {
            return;
        }

        let Some(pass) = self.pass.take() else {
            return;
        };

        let value = self.shared.cells.value.decode(&snapshot);
        let has_value = matches!(value, Ok(Some(_)));
        debug!(
            "Discarding stale pass {} of cache {}: value replaced at revision {}",
            pass.generation, self.shared.key, snapshot.revision
        );

        if let Err(e) = self.set_status(StatusEvent::Superseded { has_value }).await {
            warn!("Cache {} failed to update status: {}", self.shared.key, e);
        }
        if has_value {
            self.shared.mark_settled(pass.input_revision);
        }
        reply_all(pass.waiters, value);
    }

    async fn clear(&mut self) -> VaultCacheResult<()> {
        if let Some(pass) = self.pass.take() {
            debug!(
                "Discarding pass {} of cache {}: cleared",
                pass.generation, self.shared.key
            );
            reply_all(pass.waiters, Ok(None));
        }

        self.shared.mark_settled(0);
        self.write_value(None).await?;
        self.set_status(StatusEvent::Cleared).await
    }

    async fn succeed(
        &mut self,
        input_revision: u64,
        value: RecordMap<O>,
        waiters: Vec<Reply<Option<RecordMap<O>>>>,
    ) {
        if let Err(e) = self.write_value(Some(&value)).await {
            self.fail(waiters, e).await;
            return;
        }
        if let Err(e) = self.set_status(StatusEvent::PassSucceeded).await {
            warn!("Cache {} failed to update status: {}", self.shared.key, e);
        }
        self.shared.mark_settled(input_revision);
        reply_all(waiters, Ok(Some(value)));
    }

    async fn fail(&mut self, waiters: Vec<Reply<Option<RecordMap<O>>>>, error: VaultCacheError) {
        self.shared.mark_settled(0);
        if let Err(e) = self.set_status(StatusEvent::PassFailed).await {
            warn!("Cache {} failed to update status: {}", self.shared.key, e);
        }
        reply_all(waiters, Err(error));
    }

    async fn write_value(&mut self, value: Option<&RecordMap<O>>) -> VaultCacheResult<()> {
        self.own_value_revision = self.shared.cells.value.set(value).await?;
        Ok(())
    }

    async fn set_status(&mut self, event: StatusEvent) -> VaultCacheResult<()> {
        let next = self.status.apply(event);
        if next == self.status {
            return Ok(());
        }
        self.shared.cells.status.set(Some(&next)).await?;
        debug!("Cache {} status {} -> {}", self.shared.key, self.status, next);
        self.status = next;
        Ok(())
    }

    fn refresh_idle(&mut self) {
        let idle = self.pass.is_none() && self.shared.subscribers.load(Ordering::SeqCst) == 0;
        if !idle {
            self.idle_deadline = None;
        } else if self.idle_deadline.is_none() {
            self.idle_deadline = Some(Instant::now() + self.shared.cleanup_delay);
        }
    }

    /// Exit if still idle; decided under the driver lock so no command is lost
    fn try_retire(&mut self) -> bool {
        self.idle_deadline = None;
        let Ok(mut slot) = self.shared.driver.lock() else {
            return false;
        };
        let idle = self.pass.is_none()
            && self.shared.subscribers.load(Ordering::SeqCst) == 0
            && self.commands.is_empty();
        if idle {
            *slot = None;
            self.commands.close();
        }
        idle
    }
}

fn reply_all<O: Clone>(
    waiters: Vec<Reply<Option<RecordMap<O>>>>,
    result: VaultCacheResult<Option<RecordMap<O>>>,
) {
    for waiter in waiters {
        let outcome = match &result {
            Ok(value) => Ok(value.clone()),
            Err(e) => Err(e.to_shared()),
        };
        let _ = waiter.send(outcome);
    }
}

#[async_trait]
impl<I: InputRecord, O: OutputRecord> VaultCache<O> for LocalVaultCache<I, O> {
    fn key(&self) -> &CacheKey {
        &self.shared.key
    }

    fn mode_name(&self) -> &'static str {
        "local"
    }

    async fn value(&self) -> VaultCacheResult<Option<RecordMap<O>>> {
        self.shared.cells.value.get().await
    }

    async fn status(&self) -> VaultCacheResult<DecryptionStatus> {
        self.shared.cells.status().await
    }

    async fn subscribe(&self) -> VaultCacheResult<CacheSubscription<O>> {
        let weak = Arc::downgrade(&self.shared);
        let release = Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.subscribers.fetch_sub(1, Ordering::SeqCst);
                let _ = shared.send(Command::Released, false);
            }
        });

        let subscription = self.shared.cells.subscribe(Some(release)).await?;
        self.shared.subscribers.fetch_add(1, Ordering::SeqCst);
        self.shared.send(Command::Attached, true)?;
        Ok(subscription)
    }

    async fn decrypt(&self, ignore_cache: bool) -> VaultCacheResult<Option<RecordMap<O>>> {
        self.request(|reply| Command::Decrypt {
            ignore_cache,
            reply,
        })
        .await
    }

    async fn clear(&self) -> VaultCacheResult<()> {
        self.request(|reply| Command::Clear { reply }).await
    }

    async fn shutdown(&self) {
        let _ = self.shared.send(Command::Shutdown, false);
    }
}
