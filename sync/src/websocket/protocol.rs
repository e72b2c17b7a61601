//! WebSocket message protocol definitions.
//!
//! All messages are JSON-encoded and use snake_case for field names.

use fazenda_engine::{ActionId, ActionKind, SyncStatus};
use serde::{Deserialize, Serialize};

use crate::outbox::{Outbox, SyncOutcome};

/// Messages sent from client to server.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Queue a mutation.
    Enqueue {
        /// Mutation kind
        action: ActionKind,
        /// Logical collection ("animal", "sale", ...)
        entity: String,
        /// Entity data
        #[serde(default)]
        payload: serde_json::Value,
        /// Request ID for correlating responses
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Run a flush pass now.
    Flush {
        #[serde(default)]
        request_id: Option<String>,
    },

    /// Keep-alive ping.
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current outbox status. Sent on connect and on every change.
    Status {
        status: SyncStatus,
        pending: usize,
        dead_letters: usize,
    },

    /// Response to an enqueue request.
    Enqueued {
        id: ActionId,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to a flush request.
    Flushed {
        outcome: SyncOutcome,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },

    /// Response to ping.
    Pong,

    /// Error message.
    Error {
        /// Error description
        message: String,
        /// Request ID from the original request (if applicable)
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
    },
}

impl ServerMessage {
    /// Create an error message.
    pub fn error(message: impl Into<String>, request_id: Option<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            request_id,
        }
    }

    /// Status message carrying the outbox's current counts.
    pub fn status(status: SyncStatus, outbox: &Outbox) -> Self {
        ServerMessage::Status {
            status,
            pending: outbox.pending_count(),
            dead_letters: outbox.dead_letter_count(),
        }
    }
}
