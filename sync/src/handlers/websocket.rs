//! WebSocket handler for the UI push channel.
//!
//! Handles WebSocket connections, answers client requests and relays the
//! status broadcasts queued for this connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use fazenda_engine::is_valid_entity_name;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::outbox::Outbox;
use crate::websocket::{ClientMessage, ConnectionManager, ServerMessage};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Registers the connection with the manager
/// 2. Sends the current status
/// 3. Processes incoming messages until the client goes away
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(
    socket: WebSocket,
    outbox: Outbox,
    conn_manager: Arc<ConnectionManager>,
    client_id: String,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let conn_id = conn_manager.register(client_id.clone(), tx);

    tracing::info!(
        conn_id = %conn_id,
        client_id = %client_id,
        "WebSocket client connected"
    );

    // Forward queued messages to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    conn_manager.send_to(&conn_id, ServerMessage::status(outbox.status(), &outbox));

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(text.as_str(), &outbox).await;
                conn_manager.send_to(&conn_id, response);
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
                conn_manager.send_to(
                    &conn_id,
                    ServerMessage::error("binary messages are not supported", None),
                );
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(conn_id = %conn_id, "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(conn_id = %conn_id, "WebSocket error: {}", e);
                break;
            }
        }
    }

    conn_manager.unregister(&conn_id);
    send_task.abort();

    tracing::info!(
        conn_id = %conn_id,
        client_id = %client_id,
        active_connections = conn_manager.connection_count(),
        "WebSocket client disconnected"
    );
}

/// Rejection message for entity names that cannot be sent to the remote.
pub const INVALID_ENTITY: &str = "entity may only contain letters, digits, '-' or '_'";

/// Process a client message and return the reply.
pub async fn process_message(text: &str, outbox: &Outbox) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::error(format!("Invalid message format: {}", e), None);
        }
    };

    match client_msg {
        ClientMessage::Enqueue {
            action,
            entity,
            payload,
            request_id,
        } => {
            if entity.trim().is_empty() {
                return ServerMessage::error("entity is required", request_id);
            }
            if !is_valid_entity_name(&entity) {
                return ServerMessage::error(INVALID_ENTITY, request_id);
            }
            let id = outbox.enqueue(action, entity, payload).await;
            ServerMessage::Enqueued { id, request_id }
        }

        ClientMessage::Flush { request_id } => ServerMessage::Flushed {
            outcome: outbox.sync_all().await,
            request_id,
        },

        ClientMessage::Ping => ServerMessage::Pong,
    }
}
