//! The sync outbox.
//!
//! Local mutations are appended to a durable queue and delivered to the
//! remote in FIFO order whenever the network is reachable. The outbox owns
//! the process-wide [`SyncStatus`] and tells registered listeners whenever it
//! changes.
//!
//! Nothing here returns an error to callers of [`Outbox::enqueue`] or
//! [`Outbox::sync_all`]: failures are logged and surface through the status
//! signal, the pending count and the dead-letter list.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use fazenda_engine::{
    ActionId, ActionKind, ActionQueue, FailureOutcome, QueueSnapshot, RetryPolicy, StatusEvent,
    SyncAction, SyncStatus, Timestamp,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::listeners::{ListenerHandle, StatusListeners};
use crate::reachability::Reachability;
use crate::remote::RemoteApplier;
use crate::storage::{KeyValueStore, QUEUE_KEY};

/// Outbox tuning.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// When a failing action is dead-lettered
    pub retry_policy: RetryPolicy,
    /// Upper bound on a single remote apply
    pub apply_timeout: Duration,
    /// Storage key of the persisted queue
    pub queue_key: String,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            apply_timeout: Duration::from_secs(10),
            queue_key: QUEUE_KEY.to_string(),
        }
    }
}

impl From<&Config> for OutboxConfig {
    fn from(config: &Config) -> Self {
        Self {
            retry_policy: config.retry_policy(),
            apply_timeout: config.apply_timeout,
            queue_key: QUEUE_KEY.to_string(),
        }
    }
}

/// Why a flush did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Offline,
    AlreadyRunning,
}

/// What one flush pass did.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    /// Actions handed to the remote
    pub attempted: usize,
    /// Actions applied and pruned from the queue, in apply order
    pub synced: Vec<SyncAction>,
    /// Actions that failed and stay queued
    pub failed: Vec<ActionId>,
    /// Actions that failed for the last time and were dead-lettered
    pub dead_lettered: Vec<ActionId>,
}

/// Result of [`Outbox::sync_all`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum SyncOutcome {
    Skipped { reason: SkipReason },
    Completed { report: PassReport },
    Failed { reason: String },
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed { .. })
    }
}

struct Inner {
    queue: Mutex<ActionQueue>,
    status: Mutex<SyncStatus>,
    sync_in_progress: AtomicBool,
    /// The stored queue could not be loaded and must be set aside before the
    /// first write
    quarantine_pending: AtomicBool,
    persist_lock: tokio::sync::Mutex<()>,
    listeners: StatusListeners,
    connectivity: watch::Receiver<bool>,
    store: Arc<dyn KeyValueStore>,
    remote: Arc<dyn RemoteApplier>,
    config: OutboxConfig,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.watcher).take() {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Clears the re-entrancy flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to the process's outbox. Cheap to clone.
#[derive(Clone)]
pub struct Outbox {
    inner: Arc<Inner>,
}

impl Outbox {
    /// Load the persisted queue, read the initial reachability and start
    /// following connectivity changes.
    ///
    /// A queue that cannot be read is logged and replaced by an empty one. The
    /// stored value is copied to `{queue_key}.unreadable` before anything
    /// overwrites it.
    pub async fn start(
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteApplier>,
        reachability: Arc<dyn Reachability>,
        config: OutboxConfig,
    ) -> Self {
        let (queue, loaded) = load_queue(store.as_ref(), &config.queue_key).await;
        let connectivity = reachability.subscribe();
        let connected = reachability.fetch().await.is_connected;
        let pending = queue.pending_count();

        let outbox = Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(queue),
                status: Mutex::new(SyncStatus::initial(connected)),
                sync_in_progress: AtomicBool::new(false),
                quarantine_pending: AtomicBool::new(!loaded),
                persist_lock: tokio::sync::Mutex::new(()),
                listeners: StatusListeners::new(),
                connectivity: connectivity.clone(),
                store,
                remote,
                config,
                watcher: Mutex::new(None),
            }),
        };

        let watcher = spawn_watcher(Arc::downgrade(&outbox.inner), connectivity);
        *lock(&outbox.inner.watcher) = Some(watcher);

        info!(
            connected,
            pending,
            status = %outbox.status(),
            "Outbox started"
        );

        if connected && pending > 0 {
            outbox.flush_in_background();
        }

        outbox
    }

    /// Queue a mutation and return its id.
    ///
    /// The queue is persisted before returning. A failed write is logged and
    /// retried by the next flush. When the network is reachable a flush is
    /// started in the background.
    pub async fn enqueue(
        &self,
        kind: ActionKind,
        entity: impl Into<String>,
        payload: serde_json::Value,
    ) -> ActionId {
        let enqueued_at = now_millis();
        let id = format!("{}-{}", enqueued_at, uuid::Uuid::new_v4().simple());
        let action = SyncAction::new(id.clone(), kind, entity, payload, enqueued_at);
        let entity = action.entity.clone();

        if let Err(e) = lock(&self.inner.queue).push(action) {
            error!(action_id = %id, error = %e, "Failed to queue action");
        }

        if let Err(e) = self.persist().await {
            warn!(action_id = %id, error = %e, "Queue not persisted, will retry on next flush");
        }

        debug!(action_id = %id, kind = %kind, entity = %entity, "Action enqueued");

        if self.is_connected() {
            self.flush_in_background();
        }

        id
    }

    /// Deliver every pending action once, in FIFO order.
    ///
    /// Does nothing while offline or while another pass is running. A failed
    /// action stays queued for the next pass unless it has exhausted the
    /// retry policy, in which case it is dead-lettered.
    pub async fn sync_all(&self) -> SyncOutcome {
        if !self.is_connected() {
            debug!("Flush skipped, offline");
            return SyncOutcome::Skipped {
                reason: SkipReason::Offline,
            };
        }

        if self
            .inner
            .sync_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Flush skipped, pass already running");
            return SyncOutcome::Skipped {
                reason: SkipReason::AlreadyRunning,
            };
        }
        let _guard = PassGuard(&self.inner.sync_in_progress);

        let batch: Vec<SyncAction> = lock(&self.inner.queue).pending().cloned().collect();
        // A previous pass may have left the stored queue behind
        let retry_write = self.status() == SyncStatus::Error;

        self.transition(StatusEvent::PassStarted);
        let mut report = PassReport {
            attempted: batch.len(),
            ..PassReport::default()
        };

        for action in &batch {
            match self.apply_one(action).await {
                Ok(()) => {
                    lock(&self.inner.queue).mark_synced(&action.id);
                }
                Err(e) => {
                    let outcome = lock(&self.inner.queue).record_failure(
                        &action.id,
                        e.to_string(),
                        &self.inner.config.retry_policy,
                    );
                    match outcome {
                        Some(FailureOutcome::DeadLettered) => {
                            error!(
                                action_id = %action.id,
                                entity = %action.entity,
                                error = %e,
                                "Action dead-lettered after repeated failures"
                            );
                            report.dead_lettered.push(action.id.clone());
                        }
                        Some(FailureOutcome::Retry) => {
                            warn!(
                                action_id = %action.id,
                                entity = %action.entity,
                                error = %e,
                                "Action apply failed, will retry"
                            );
                            report.failed.push(action.id.clone());
                        }
                        // Cleared from the queue while the apply was in flight
                        None => {}
                    }
                }
            }
        }

        report.synced = lock(&self.inner.queue).prune_synced();

        if !batch.is_empty() || retry_write {
            if let Err(e) = self.persist().await {
                error!(error = %e, "Failed to persist queue after flush");
                self.transition(StatusEvent::PassFailed);
                return SyncOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }

        if self.is_connected() {
            self.transition(StatusEvent::PassCompleted);
        } else {
            self.transition(StatusEvent::ReachabilityLost);
        }

        info!(
            attempted = report.attempted,
            synced = report.synced.len(),
            failed = report.failed.len(),
            dead_lettered = report.dead_lettered.len(),
            "Flush pass finished"
        );

        SyncOutcome::Completed { report }
    }

    /// Register a status listener.
    pub fn on_status_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(SyncStatus) + Send + Sync + 'static,
    {
        self.inner.listeners.subscribe(listener)
    }

    pub fn status(&self) -> SyncStatus {
        *lock(&self.inner.status)
    }

    /// Actions not yet applied remotely. Dead letters are not counted.
    pub fn pending_count(&self) -> usize {
        lock(&self.inner.queue).pending_count()
    }

    pub fn dead_letter_count(&self) -> usize {
        lock(&self.inner.queue).dead_letters().len()
    }

    pub fn pending_actions(&self) -> Vec<SyncAction> {
        lock(&self.inner.queue).pending().cloned().collect()
    }

    pub fn dead_letters(&self) -> Vec<SyncAction> {
        lock(&self.inner.queue).dead_letters().to_vec()
    }

    /// Whether the last known reachability is connected.
    pub fn is_connected(&self) -> bool {
        *self.inner.connectivity.borrow()
    }

    /// Drop every queued and dead-lettered action and persist the empty queue.
    ///
    /// Destructive; meant for explicit data-reset flows.
    pub async fn clear_queue(&self) -> Result<()> {
        let dropped = {
            let mut queue = lock(&self.inner.queue);
            let dropped = queue.len() + queue.dead_letters().len();
            queue.clear();
            dropped
        };
        warn!(dropped, "Outbox queue cleared");
        self.persist().await
    }

    /// Move dead letters back into the queue with a fresh retry budget.
    pub async fn retry_dead_letters(&self) -> Result<usize> {
        let requeued = lock(&self.inner.queue).requeue_dead_letters();
        if requeued == 0 {
            return Ok(0);
        }

        info!(requeued, "Dead letters requeued");
        self.persist().await?;

        if self.is_connected() {
            self.flush_in_background();
        }
        Ok(requeued)
    }

    /// Non-owning handle, for listeners that need to read the outbox back.
    pub fn downgrade(&self) -> WeakOutbox {
        WeakOutbox {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Start a flush on its own task.
    pub fn flush_in_background(&self) -> JoinHandle<SyncOutcome> {
        let outbox = self.clone();
        tokio::spawn(async move { outbox.sync_all().await })
    }

    async fn apply_one(&self, action: &SyncAction) -> Result<()> {
        let timeout = self.inner.config.apply_timeout;
        match tokio::time::timeout(timeout, self.inner.remote.apply(action)).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Write the current queue. Writes are serialized so the last write
    /// always carries the latest state.
    async fn persist(&self) -> Result<()> {
        let _write = self.inner.persist_lock.lock().await;
        if self.inner.quarantine_pending.load(Ordering::Acquire) {
            self.quarantine().await?;
        }
        let json = lock(&self.inner.queue).export().to_json()?;
        self.inner.store.set(&self.inner.config.queue_key, &json).await
    }

    /// Copy the stored queue that failed to load out of the way. Callers hold
    /// `persist_lock`.
    async fn quarantine(&self) -> Result<()> {
        let store = &self.inner.store;
        let key = &self.inner.config.queue_key;

        if let Some(raw) = store.get(key).await? {
            let mut target = format!("{}.unreadable", key);
            if store.get(&target).await?.is_some() {
                target = format!("{}.{}", target, now_millis());
            }
            store.set(&target, &raw).await?;
            warn!(key = %target, bytes = raw.len(), "Unreadable queue set aside");
        }

        self.inner.quarantine_pending.store(false, Ordering::Release);
        Ok(())
    }

    fn transition(&self, event: StatusEvent) {
        self.update_status(|current| Some(current.next(event)));
    }

    /// Apply `decide` to the current status; listeners hear about real changes only.
    fn update_status(&self, decide: impl FnOnce(SyncStatus) -> Option<SyncStatus>) {
        let changed = {
            let mut status = lock(&self.inner.status);
            let current = *status;
            match decide(current) {
                Some(next) if next != current => {
                    debug!(from = %current, to = %next, "Sync status changed");
                    *status = next;
                    Some(next)
                }
                _ => None,
            }
        };

        if let Some(status) = changed {
            self.inner.listeners.notify(status);
        }
    }
}

/// Weak counterpart of [`Outbox`].
#[derive(Clone)]
pub struct WeakOutbox {
    inner: Weak<Inner>,
}

impl WeakOutbox {
    pub fn upgrade(&self) -> Option<Outbox> {
        self.inner.upgrade().map(|inner| Outbox { inner })
    }
}

/// Load the persisted queue. The flag is false when a stored value exists
/// but could not be read.
async fn load_queue(store: &dyn KeyValueStore, key: &str) -> (ActionQueue, bool) {
    let raw = match store.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return (ActionQueue::new(), true),
        Err(e) => {
            error!(error = %e, "Failed to read persisted queue, starting empty");
            return (ActionQueue::new(), false);
        }
    };

    match QueueSnapshot::from_json(&raw).and_then(ActionQueue::from_snapshot) {
        Ok(queue) => {
            debug!(
                pending = queue.pending_count(),
                dead_letters = queue.dead_letters().len(),
                "Persisted queue loaded"
            );
            (queue, true)
        }
        Err(e) => {
            error!(error = %e, "Persisted queue is unreadable, starting empty");
            (ActionQueue::new(), false)
        }
    }
}

fn spawn_watcher(inner: Weak<Inner>, mut connectivity: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while connectivity.changed().await.is_ok() {
            let connected = *connectivity.borrow_and_update();
            let Some(inner) = inner.upgrade() else {
                break;
            };
            let outbox = Outbox { inner };

            if connected {
                info!("Network reachable, flushing outbox");
                outbox.update_status(|current| {
                    (current == SyncStatus::Offline)
                        .then(|| current.next(StatusEvent::ReachabilityRegained))
                });
                outbox.flush_in_background();
            } else {
                info!("Network lost");
                outbox.transition(StatusEvent::ReachabilityLost);
            }
        }
    })
}

fn now_millis() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}
