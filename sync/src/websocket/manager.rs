//! WebSocket connection manager.
//!
//! Tracks connected UI clients so status changes can be pushed to all of them.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use super::ServerMessage;

/// Sender for WebSocket messages.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// A single WebSocket connection.
#[derive(Debug)]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: String,
    /// Client name given at connect time
    pub client_id: String,
    /// Channel to send messages to this connection
    pub sender: MessageSender,
}

/// Manages active WebSocket connections.
///
/// Thread-safe and can be shared across handlers via `Arc`.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    /// All active connections, keyed by connection ID.
    connections: DashMap<String, Connection>,
    /// Connection IDs per client, a client may have several screens open.
    by_client: DashMap<String, Vec<String>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new connection manager wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection and return its ID.
    pub fn register(&self, client_id: String, sender: MessageSender) -> String {
        let conn_id = uuid::Uuid::new_v4().to_string();

        self.connections.insert(
            conn_id.clone(),
            Connection {
                id: conn_id.clone(),
                client_id: client_id.clone(),
                sender,
            },
        );
        self.by_client
            .entry(client_id)
            .or_default()
            .push(conn_id.clone());

        tracing::info!(conn_id = %conn_id, "WebSocket connection registered");

        conn_id
    }

    /// Unregister a connection.
    pub fn unregister(&self, conn_id: &str) {
        if let Some((_, conn)) = self.connections.remove(conn_id) {
            if let Some(mut conn_ids) = self.by_client.get_mut(&conn.client_id) {
                conn_ids.retain(|id| id != conn_id);
                if conn_ids.is_empty() {
                    drop(conn_ids);
                    self.by_client.remove(&conn.client_id);
                }
            }

            tracing::info!(conn_id = %conn_id, client_id = %conn.client_id, "WebSocket connection unregistered");
        }
    }

    /// Broadcast a message to all connections.
    ///
    /// Returns the number of connections that received the message.
    pub fn broadcast_all(&self, message: ServerMessage) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().sender.send(message.clone()).is_ok())
            .count()
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, conn_id: &str, message: ServerMessage) -> bool {
        match self.connections.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Get the number of active connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of distinct clients connected.
    pub fn client_count(&self) -> usize {
        self.by_client.len()
    }
}
