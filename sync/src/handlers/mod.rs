//! Request handlers shared by the HTTP routes and the WebSocket channel.

mod vision;
mod websocket;

pub use vision::*;
pub use websocket::{handle_websocket_connection, process_message, INVALID_ENTITY};
