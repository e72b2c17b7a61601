//! Outbox endpoint routes.

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use fazenda_engine::{is_valid_entity_name, ActionId, ActionKind, SyncAction, SyncStatus};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::{AppError, AppResult};
use crate::handlers::{handle_websocket_connection, INVALID_ENTITY};
use crate::outbox::SyncOutcome;
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync/status", get(status_handler))
        .route("/sync/actions", post(enqueue_handler))
        .route("/sync/flush", post(flush_handler))
        .route("/sync/queue", delete(clear_handler))
        .route("/sync/dead-letters", get(dead_letters_handler))
        .route("/sync/dead-letters/retry", post(retry_handler))
        .route("/sync/ws", get(ws_handler))
}

/// Outbox status as shown by the UI badge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: SyncStatus,
    pub pending: usize,
    pub dead_letters: usize,
}

/// Request body for queueing a mutation.
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub entity: String,
    #[serde(default, alias = "data")]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub id: ActionId,
}

#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub requeued: usize,
}

/// GET /sync/status
async fn status_handler(State(state): State<AppState>, _auth: AuthUser) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: state.outbox.status(),
        pending: state.outbox.pending_count(),
        dead_letters: state.outbox.dead_letter_count(),
    })
}

/// POST /sync/actions - Queue a mutation for delivery.
async fn enqueue_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(request): Json<EnqueueRequest>,
) -> AppResult<(StatusCode, Json<EnqueueResponse>)> {
    let entity = request.entity.trim();
    if entity.is_empty() {
        return Err(AppError::BadRequest("entity is required".to_string()));
    }
    if !is_valid_entity_name(entity) {
        return Err(AppError::BadRequest(INVALID_ENTITY.to_string()));
    }

    let id = state
        .outbox
        .enqueue(request.kind, entity, request.payload)
        .await;
    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse { id })))
}

/// POST /sync/flush - Run a flush pass and report what it did.
async fn flush_handler(State(state): State<AppState>, _auth: AuthUser) -> Json<SyncOutcome> {
    Json(state.outbox.sync_all().await)
}

/// DELETE /sync/queue - Drop every queued and dead-lettered action.
async fn clear_handler(State(state): State<AppState>, _auth: AuthUser) -> AppResult<StatusCode> {
    state.outbox.clear_queue().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sync/dead-letters
async fn dead_letters_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Json<Vec<SyncAction>> {
    Json(state.outbox.dead_letters())
}

/// POST /sync/dead-letters/retry - Give dead letters a fresh retry budget.
async fn retry_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<RetryResponse>> {
    let requeued = state.outbox.retry_dead_letters().await?;
    Ok(Json(RetryResponse { requeued }))
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Client name, for logs
    #[serde(default)]
    pub client: Option<String>,
}

/// GET /sync/ws - Upgrade to the push channel.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<WsQuery>,
) -> Response {
    let client_id = query.client.unwrap_or_else(|| "anonymous".to_string());
    ws.on_upgrade(move |socket| {
        handle_websocket_connection(socket, state.outbox, state.conn_manager, client_id)
    })
}
