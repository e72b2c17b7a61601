//! WebSocket push channel for the UI.
//!
//! Connected clients receive a `status` message whenever the outbox status
//! changes, and can enqueue actions or request a flush over the same socket.

mod manager;
mod protocol;

pub use manager::ConnectionManager;
pub use protocol::*;

use std::sync::Arc;

use crate::listeners::ListenerHandle;
use crate::outbox::Outbox;

/// Broadcast every outbox status change to all connected clients.
pub fn forward_status_changes(
    outbox: &Outbox,
    conn_manager: Arc<ConnectionManager>,
) -> ListenerHandle {
    let weak = outbox.downgrade();
    outbox.on_status_change(move |status| {
        let Some(outbox) = weak.upgrade() else {
            return;
        };
        let message = ServerMessage::status(status, &outbox);
        let sent = conn_manager.broadcast_all(message);
        tracing::debug!(status = %status, recipients = sent, "Status broadcast");
    })
}
