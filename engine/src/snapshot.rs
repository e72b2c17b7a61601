//! Persisted form of the action queue.
//!
//! Snapshots are the bridge between the in-memory [`ActionQueue`] and the
//! key-value store the runtime writes to. Earlier app versions stored the
//! queue as a bare JSON array of actions; [`QueueSnapshot::from_json`] still
//! reads that shape and upgrades it to the versioned envelope.

use crate::{error::Result, ActionQueue, Error, SyncAction};
use serde::{Deserialize, Serialize};

/// Version of the queue format for future compatibility.
pub const QUEUE_FORMAT_VERSION: u32 = 1;

/// A point-in-time snapshot of the outbox queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Queue format version
    pub format_version: u32,
    /// Queued actions in enqueue order
    pub actions: Vec<SyncAction>,
    /// Actions that exhausted their retry budget
    #[serde(default)]
    pub dead_letters: Vec<SyncAction>,
}

impl QueueSnapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::from_actions(Vec::new())
    }

    /// Wrap a list of actions in the current format.
    pub fn from_actions(actions: Vec<SyncAction>) -> Self {
        Self {
            format_version: QUEUE_FORMAT_VERSION,
            actions,
            dead_letters: Vec::new(),
        }
    }

    /// Count of actions not yet synced.
    pub fn pending_count(&self) -> usize {
        self.actions.iter().filter(|a| !a.synced).count()
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidQueue(e.to_string()))
    }

    /// Deserialize from JSON, accepting the legacy bare-array format.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| Error::InvalidQueue(e.to_string()))?;

        if value.is_array() {
            let actions: Vec<SyncAction> =
                serde_json::from_value(value).map_err(|e| Error::InvalidQueue(e.to_string()))?;
            return Ok(Self::from_actions(actions));
        }

        let snapshot: Self =
            serde_json::from_value(value).map_err(|e| Error::InvalidQueue(e.to_string()))?;

        if snapshot.format_version > QUEUE_FORMAT_VERSION {
            return Err(Error::UnsupportedFormat {
                found: snapshot.format_version,
                supported: QUEUE_FORMAT_VERSION,
            });
        }

        Ok(snapshot)
    }
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionQueue {
    /// Export the queue for persistence.
    pub fn export(&self) -> QueueSnapshot {
        QueueSnapshot {
            format_version: QUEUE_FORMAT_VERSION,
            actions: self.actions().to_vec(),
            dead_letters: self.dead_letters().to_vec(),
        }
    }

    /// Rebuild a queue from a snapshot.
    pub fn from_snapshot(snapshot: QueueSnapshot) -> Result<Self> {
        ActionQueue::from_parts(snapshot.actions, snapshot.dead_letters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ActionKind, RetryPolicy};
    use serde_json::json;

    fn sample_queue() -> ActionQueue {
        let mut queue = ActionQueue::new();
        queue
            .push(SyncAction::new(
                "a-1",
                ActionKind::Create,
                "animal",
                json!({"brinco": "0042", "pesoKg": 412.5}),
                1000,
            ))
            .unwrap();
        queue
            .push(SyncAction::new(
                "a-2",
                ActionKind::Delete,
                "cost",
                json!({"id": 7}),
                2000,
            ))
            .unwrap();
        queue
    }

    #[test]
    fn export_import_preserves_order_and_dead_letters() {
        let mut queue = sample_queue();
        queue.record_failure("a-2", "rejected", &RetryPolicy::with_max_attempts(1));

        let json = queue.export().to_json().unwrap();
        let restored = ActionQueue::from_snapshot(QueueSnapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored, queue);
        assert_eq!(restored.dead_letters()[0].id, "a-2");
    }

    #[test]
    fn legacy_array_is_migrated() {
        let json = r#"[
            {"id": "1-a", "type": "create", "entity": "animal", "data": {}, "timestamp": 10, "synced": false},
            {"id": "2-b", "type": "update", "entity": "venda", "data": {"x": 1}, "timestamp": 20, "synced": false}
        ]"#;

        let snapshot = QueueSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.format_version, QUEUE_FORMAT_VERSION);
        assert_eq!(snapshot.actions.len(), 2);
        assert_eq!(snapshot.pending_count(), 2);
        assert!(snapshot.dead_letters.is_empty());
        assert_eq!(snapshot.actions[1].entity, "venda");
    }

    #[test]
    fn future_format_is_rejected() {
        let json = r#"{"formatVersion": 99, "actions": []}"#;
        let result = QueueSnapshot::from_json(json);
        assert!(matches!(
            result,
            Err(Error::UnsupportedFormat {
                found: 99,
                supported: QUEUE_FORMAT_VERSION
            })
        ));
    }

    #[test]
    fn garbage_is_invalid_queue() {
        assert!(matches!(
            QueueSnapshot::from_json("not json"),
            Err(Error::InvalidQueue(_))
        ));
        assert!(matches!(
            QueueSnapshot::from_json(r#"{"formatVersion": 1}"#),
            Err(Error::InvalidQueue(_))
        ));
    }

    #[test]
    fn duplicate_ids_in_snapshot_rejected() {
        let action = SyncAction::new("dup", ActionKind::Create, "animal", json!({}), 1);
        let snapshot = QueueSnapshot::from_actions(vec![action.clone(), action]);
        assert!(matches!(
            ActionQueue::from_snapshot(snapshot),
            Err(Error::DuplicateAction(_))
        ));
    }

    #[test]
    fn empty_snapshot() {
        let snapshot = QueueSnapshot::default();
        let json = snapshot.to_json().unwrap();
        assert_eq!(json, r#"{"formatVersion":1,"actions":[],"deadLetters":[]}"#);
    }
}
