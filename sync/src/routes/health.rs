//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use fazenda_engine::SyncStatus;
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sync_status: SyncStatus,
    pub connections: usize,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sync_status: state.outbox.status(),
        connections: state.conn_manager.connection_count(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Fazenda Sync Agent"
}
