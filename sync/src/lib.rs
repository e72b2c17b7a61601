//! Fazenda Sync - offline-first sync agent for Fazenda Digital.
//!
//! Runs next to the farm app, keeps an outbox of local mutations and
//! delivers them to the backend whenever the network allows. The UI talks to
//! it over a small local HTTP API and a WebSocket that pushes status changes.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod listeners;
pub mod outbox;
pub mod reachability;
pub mod remote;
pub mod routes;
pub mod storage;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::{Config, ConfigError};
pub use error::{AppError, Result, SyncError};
pub use listeners::{ListenerHandle, StatusListeners};
pub use outbox::{Outbox, OutboxConfig, PassReport, SkipReason, SyncOutcome};
pub use reachability::{HttpProbe, ManualReachability, NetworkState, Reachability};
pub use remote::{HttpApplier, HttpApplierConfig, NoopApplier, RemoteApplier};
pub use storage::{FileStore, KeyValueStore, MemoryStore, QUEUE_KEY};
pub use websocket::ConnectionManager;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub outbox: Outbox,
    pub config: Arc<Config>,
    pub conn_manager: Arc<ConnectionManager>,
}

/// Build the HTTP router with tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
