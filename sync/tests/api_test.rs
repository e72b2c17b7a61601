//! HTTP route tests, driven through the router without binding a socket.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use fazenda_sync::{
    build_router, AppState, Config, ConnectionManager, ManualReachability, MemoryStore,
    NoopApplier, Outbox, OutboxConfig,
};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app_with(config: Config, connected: bool) -> (Router, Outbox) {
    let outbox = Outbox::start(
        Arc::new(MemoryStore::new()),
        Arc::new(NoopApplier::new(Duration::from_millis(1))),
        ManualReachability::new_shared(connected),
        OutboxConfig::from(&config),
    )
    .await;

    let state = AppState {
        outbox: outbox.clone(),
        config: Arc::new(config),
        conn_manager: ConnectionManager::new_shared(),
    };
    (build_router(state), outbox)
}

async fn app(connected: bool) -> (Router, Outbox) {
    app_with(Config::default(), connected).await
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn health() {
    let (app, _) = app(true).await;
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["syncStatus"], "online");
}

#[tokio::test]
async fn enqueue_and_status() {
    let (app, outbox) = app(false).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/sync/actions",
        Some(json!({"type": "create", "entity": "animal", "payload": {"brinco": "0042"}})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(outbox.pending_actions()[0].id, id);

    let (status, body) = send(&app, Method::GET, "/sync/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "offline", "pending": 1, "deadLetters": 0}));
}

#[tokio::test]
async fn enqueue_accepts_legacy_data_field() {
    let (app, outbox) = app(false).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/sync/actions",
        Some(json!({"type": "update", "entity": "sale", "data": {"valor": 10}})),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(outbox.pending_actions()[0].payload, json!({"valor": 10}));
}

#[tokio::test]
async fn enqueue_requires_entity() {
    let (app, outbox) = app(false).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/sync/actions",
        Some(json!({"type": "create", "entity": "  "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "entity is required");
    assert_eq!(outbox.pending_count(), 0);
}

#[tokio::test]
async fn enqueue_rejects_entity_outside_a_path_segment() {
    let (app, outbox) = app(false).await;
    for entity in ["animal/../admin", "sale?drop=1"] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/sync/actions",
            Some(json!({"type": "create", "entity": entity})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("entity may only contain"));
    }
    assert_eq!(outbox.pending_count(), 0);
}

#[tokio::test]
async fn flush_while_offline_is_skipped() {
    let (app, _) = app(false).await;
    let (status, body) = send(&app, Method::POST, "/sync/flush", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"outcome": "skipped", "reason": "offline"}));
}

#[tokio::test]
async fn clear_queue() {
    let (app, outbox) = app(false).await;
    send(
        &app,
        Method::POST,
        "/sync/actions",
        Some(json!({"type": "delete", "entity": "cost"})),
    )
    .await;

    let (status, _) = send(&app, Method::DELETE, "/sync/queue", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(outbox.pending_count(), 0);
}

#[tokio::test]
async fn dead_letters_empty() {
    let (app, _) = app(true).await;

    let (status, body) = send(&app, Method::GET, "/sync/dead-letters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = send(&app, Method::POST, "/sync/dead-letters/retry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"requeued": 0}));
}

#[tokio::test]
async fn bearer_token_is_enforced_when_configured() {
    let config = Config {
        auth_token: Some("s3cret".to_string()),
        ..Config::default()
    };
    let (app, _) = app_with(config, true).await;

    let (status, _) = send(&app, Method::GET, "/sync/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/sync/status")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/sync/status")
        .header(header::AUTHORIZATION, "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Health stays open for probes
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn vision_pen_count() {
    let (app, _) = app(true).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/vision/pen-count",
        Some(json!({
            "samples": [
                {"cameraId": 1, "count": 45, "confidence": 0.95},
                {"cameraId": 2, "count": 48, "confidence": 0.92},
                {"cameraId": 3, "count": 42, "confidence": 0.88},
                {"cameraId": 4, "count": 50, "confidence": 0.91}
            ],
            "rule": "principal",
            "primaryCamera": 3
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 42);
    assert_eq!(body["rule"], "principal");
    assert_eq!(body["cameras"], 4);
    assert!(body.get("smoothedCount").is_none());
}

#[tokio::test]
async fn vision_calibration_and_weight() {
    let (app, _) = app(true).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/vision/calibration",
        Some(json!({"samples": [
            {"estimated": 300.0, "actual": 310.0},
            {"estimated": 350.0, "actual": 355.0},
            {"estimated": 400.0, "actual": 412.0},
            {"estimated": 450.0, "actual": 455.0}
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["a"].as_f64().unwrap() - 1.0).abs() < 0.1);
    assert!(body["rmse"].as_f64().unwrap() < 20.0);
    assert_eq!(body["sampleCount"], 4);

    let (status, body) = send(
        &app,
        Method::POST,
        "/vision/weight",
        Some(json!({"width": 100.0, "height": 50.0, "coefficients": {"a": 0.5, "b": 20.0}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["estimatedKg"], 2520.0);
    assert!(body.get("calibratedKg").is_none());
}

#[tokio::test]
async fn vision_rejects_invalid_input() {
    let (app, _) = app(true).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/vision/weight",
        Some(json!({"width": 100.0, "height": 50.0, "coefficients": {"a": 0.08, "b": 20.0}, "carcassYield": 1.5})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("carcassYield"));
}
