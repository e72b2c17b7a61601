//! Sync actions and the in-memory action queue.
//!
//! Every local mutation is captured as a [`SyncAction`] and appended to an
//! [`ActionQueue`]. The queue owns the outbox bookkeeping (FIFO order, the
//! `synced` flag, attempt counters, dead letters) but performs no IO; the
//! runtime persists it through [`QueueSnapshot`](crate::QueueSnapshot).

use crate::{error::Result, ActionId, EntityName, Error, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default number of failed attempts before an action is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// The kind of mutation an action carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Update,
    Delete,
}

impl ActionKind {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" => Ok(ActionKind::Create),
            "update" => Ok(ActionKind::Update),
            "delete" => Ok(ActionKind::Delete),
            _ => Err(Error::UnknownVariant {
                kind: "action kind",
                value: s.to_string(),
            }),
        }
    }
}

/// A queued mutation intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAction {
    /// Unique identifier, assigned at enqueue time
    pub id: ActionId,
    /// Mutation kind
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// Logical collection being mutated ("animal", "sale", "cost", ...)
    pub entity: EntityName,
    /// Entity-specific data, opaque to the outbox
    #[serde(default, alias = "data")]
    pub payload: serde_json::Value,
    /// Creation time in milliseconds since epoch
    #[serde(alias = "timestamp")]
    pub enqueued_at: Timestamp,
    /// Set once the remote apply succeeded
    #[serde(default)]
    pub synced: bool,
    /// Failed apply attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// Message of the most recent failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncAction {
    /// Create a new, unsynced action.
    pub fn new(
        id: impl Into<ActionId>,
        kind: ActionKind,
        entity: impl Into<EntityName>,
        payload: serde_json::Value,
        enqueued_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            entity: entity.into(),
            payload,
            enqueued_at,
            synced: false,
            attempts: 0,
            last_error: None,
        }
    }

    /// Mark the action as applied remotely. There is no way back to unsynced.
    pub fn mark_synced(&mut self) {
        self.synced = true;
        self.last_error = None;
    }
}

/// Whether `name` can be used as an entity: non-empty ASCII letters, digits,
/// `-` or `_`. Entities become URL path segments on the remote.
pub fn is_valid_entity_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// How many times a failing action is retried before it is dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    /// `None` retries forever
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever.
    pub fn unlimited() -> Self {
        Self { max_attempts: None }
    }

    /// Dead-letter after `max_attempts` failures. Zero means unlimited.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: (max_attempts > 0).then_some(max_attempts),
        }
    }

    /// Whether an action with this many failures should stop being retried.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_max_attempts(DEFAULT_MAX_ATTEMPTS)
    }
}

/// What happened to an action after a failed apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still queued, will be attempted on the next flush
    Retry,
    /// Moved to the dead-letter list
    DeadLettered,
}

/// FIFO queue of pending actions plus the dead-letter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionQueue {
    actions: Vec<SyncAction>,
    dead_letters: Vec<SyncAction>,
}

impl ActionQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from its parts. Duplicate ids are rejected.
    pub fn from_parts(actions: Vec<SyncAction>, dead_letters: Vec<SyncAction>) -> Result<Self> {
        let mut queue = Self::new();
        for action in actions {
            queue.push(action)?;
        }
        for action in dead_letters {
            if queue.contains(&action.id) {
                return Err(Error::DuplicateAction(action.id));
            }
            queue.dead_letters.push(action);
        }
        Ok(queue)
    }

    /// Append an action to the tail of the queue.
    pub fn push(&mut self, action: SyncAction) -> Result<()> {
        if self.contains(&action.id) {
            return Err(Error::DuplicateAction(action.id));
        }
        self.actions.push(action);
        Ok(())
    }

    /// Whether an id is known, queued or dead-lettered.
    pub fn contains(&self, id: &str) -> bool {
        self.actions.iter().any(|a| a.id == id) || self.dead_letters.iter().any(|a| a.id == id)
    }

    /// Get a queued action by id.
    pub fn get(&self, id: &str) -> Option<&SyncAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// All queued actions, synced or not, in enqueue order.
    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    /// Unsynced actions in enqueue order.
    pub fn pending(&self) -> impl Iterator<Item = &SyncAction> {
        self.actions.iter().filter(|a| !a.synced)
    }

    /// Count of unsynced actions.
    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    /// Actions that exhausted their retry budget.
    pub fn dead_letters(&self) -> &[SyncAction] {
        &self.dead_letters
    }

    /// Total queued actions (excluding dead letters).
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if nothing is queued or dead-lettered.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.dead_letters.is_empty()
    }

    /// Mark an action as synced. Returns false if the id is not queued.
    pub fn mark_synced(&mut self, id: &str) -> bool {
        match self.actions.iter_mut().find(|a| a.id == id) {
            Some(action) => {
                action.mark_synced();
                true
            }
            None => false,
        }
    }

    /// Record a failed apply attempt.
    ///
    /// Returns `None` when the id is not queued or already synced.
    pub fn record_failure(
        &mut self,
        id: &str,
        error: impl Into<String>,
        policy: &RetryPolicy,
    ) -> Option<FailureOutcome> {
        let index = self.actions.iter().position(|a| a.id == id && !a.synced)?;

        let action = &mut self.actions[index];
        action.attempts = action.attempts.saturating_add(1);
        action.last_error = Some(error.into());

        if policy.is_exhausted(action.attempts) {
            let action = self.actions.remove(index);
            self.dead_letters.push(action);
            Some(FailureOutcome::DeadLettered)
        } else {
            Some(FailureOutcome::Retry)
        }
    }

    /// Remove synced actions, returning them in enqueue order.
    pub fn prune_synced(&mut self) -> Vec<SyncAction> {
        let (synced, pending): (Vec<_>, Vec<_>) =
            self.actions.drain(..).partition(|a| a.synced);
        self.actions = pending;
        synced
    }

    /// Move dead letters back to the tail of the queue with a fresh retry budget.
    pub fn requeue_dead_letters(&mut self) -> usize {
        let count = self.dead_letters.len();
        for mut action in self.dead_letters.drain(..) {
            action.attempts = 0;
            self.actions.push(action);
        }
        count
    }

    /// Drop everything, including dead letters.
    pub fn clear(&mut self) {
        self.actions.clear();
        self.dead_letters.clear();
    }
}
