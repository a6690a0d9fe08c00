//! End-to-end tests for the webhook, health and metrics endpoints.
//!
//! Requests go through the axum router with `oneshot`; the store is the
//! in-process one, so no Redis is needed.
//!
//! Run with: cargo test --test http_endpoints

use std::sync::{Arc, Mutex};
use std::time::Duration;

use actbot::assistant::{Assistant, AssistantOptions, RetryPolicy};
use actbot::audit::SecurityLog;
use actbot::bot::{Messenger, Pipeline};
use actbot::crypto::Cipher;
use actbot::http::{HttpState, SECRET_HEADER, build_router, health_inner};
use actbot::knowledge::KnowledgeStore;
use actbot::metrics::Metrics;
use actbot::openai;
use actbot::rate_limit::RateLimiter;
use actbot::session::SessionStore;
use actbot::store::{KeyValueStore, MemoryStore, StoreError};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use std::collections::HashMap;
use teloxide::types::{ChatId, UserId};
use tower::ServiceExt;

const SECRET: &str = "hook-secret";

#[derive(Default)]
struct Outbox(Mutex<Vec<String>>);

#[async_trait]
impl Messenger for Outbox {
    async fn send_text(&self, _chat_id: ChatId, text: &str) -> Result<(), String> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A store whose PING fails, for the unhealthy path.
struct DownStore;

#[async_trait]
impl KeyValueStore for DownStore {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        Err(StoreError::WrongType(key.into()))
    }
    async fn hash_set_with_ttl(&self, key: &str, _: Vec<(String, Vec<u8>)>, _: Duration) -> Result<(), StoreError> {
        Err(StoreError::WrongType(key.into()))
    }
    async fn incr_in_window(&self, key: &str, _: Duration) -> Result<i64, StoreError> {
        Err(StoreError::WrongType(key.into()))
    }
    async fn list_push(&self, key: &str, _: String) -> Result<(), StoreError> {
        Err(StoreError::WrongType(key.into()))
    }
    async fn list_range(&self, key: &str, _: isize, _: isize) -> Result<Vec<String>, StoreError> {
        Err(StoreError::WrongType(key.into()))
    }
    async fn ping(&self) -> Result<bool, StoreError> {
        Err(StoreError::WrongType("PING".into()))
    }
}

fn make_state(store: Arc<dyn KeyValueStore>) -> (Arc<HttpState>, Arc<Outbox>) {
    let knowledge = KnowledgeStore::with_document(
        std::env::temp_dir().join("actbot-http-test.yaml"),
        serde_yaml::from_str("contacts:\n  phone: '+251-11-555-0100'\n").unwrap(),
    );
    let client = openai::Client::new(
        "sk-test".into(),
        "http://127.0.0.1:1".into(),
        "gpt-3.5-turbo".into(),
        Duration::from_secs(1),
    )
    .unwrap();
    let assistant = Assistant::new(
        client,
        AssistantOptions {
            max_tokens: 300,
            moderation: false,
            sanitize: true,
            retry: RetryPolicy {
                attempts: 1,
                ..RetryPolicy::default()
            },
        },
    );
    let outbox = Arc::new(Outbox::default());
    let cipher = Cipher::new([3u8; 32]);
    let pipeline = Pipeline::new(
        outbox.clone(),
        SessionStore::new(store.clone(), cipher, Duration::from_secs(3600)),
        RateLimiter::new(store.clone(), 5),
        SecurityLog::new(store.clone()),
        Arc::new(knowledge),
        assistant,
        UserId(1000),
        "act_bot".into(),
    );
    let state = Arc::new(HttpState {
        pipeline,
        webhook_secret: SECRET.into(),
        store,
        metrics: Metrics::new().unwrap(),
    });
    (state, outbox)
}

fn text_update(text: &str) -> serde_json::Value {
    json!({
        "update_id": 1,
        "message": {
            "message_id": 7,
            "date": 1_700_000_000,
            "chat": {"id": 42, "type": "private", "first_name": "Abebe"},
            "from": {"id": 42, "is_bot": false, "first_name": "Abebe"},
            "text": text
        }
    })
}

fn webhook_request(secret: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header(SECRET_HEADER, secret);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ===========================================================================
// POST /webhook
// ===========================================================================

#[tokio::test]
async fn test_webhook_rejects_wrong_secret() {
    let (state, outbox) = make_state(Arc::new(MemoryStore::new()));
    let app = build_router(state.clone());

    let response = app
        .oneshot(webhook_request(Some("guess"), text_update("contact").to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(outbox.0.lock().unwrap().is_empty(), "no update may be processed");
    let metrics = state.metrics.render().unwrap();
    assert!(metrics.contains(r#"status="invalid_token"} 1"#));
}

#[tokio::test]
async fn test_webhook_rejects_missing_secret() {
    let (state, outbox) = make_state(Arc::new(MemoryStore::new()));
    let response = build_router(state)
        .oneshot(webhook_request(None, text_update("contact").to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(outbox.0.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_webhook_processes_update() {
    let (state, outbox) = make_state(Arc::new(MemoryStore::new()));
    let response = build_router(state.clone())
        .oneshot(webhook_request(Some(SECRET), text_update("how do I contact you").to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = outbox.0.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("📱 General: +251-11-555-0100"));

    let metrics = state.metrics.render().unwrap();
    assert!(metrics.contains(r#"status="received"} 1"#));
    assert!(metrics.contains(r#"status="success"} 1"#));
    assert!(metrics.contains("http_response_time_seconds_count 1"));
}

#[tokio::test]
async fn test_webhook_bad_body_is_server_error() {
    let (state, _) = make_state(Arc::new(MemoryStore::new()));
    let response = build_router(state.clone())
        .oneshot(webhook_request(Some(SECRET), "{not json".into()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(state.metrics.render().unwrap().contains(r#"status="error"} 1"#));
}

// ===========================================================================
// GET /health
// ===========================================================================

#[tokio::test]
async fn test_health_ok_with_store() {
    let (state, _) = make_state(Arc::new(MemoryStore::new()));
    let response = build_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["redis"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_unavailable_when_store_down() {
    let (status, body) = health_inner(&DownStore).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["redis"], false);
}

// ===========================================================================
// GET /metrics
// ===========================================================================

#[tokio::test]
async fn test_metrics_exposition() {
    let (state, _) = make_state(Arc::new(MemoryStore::new()));
    let app = build_router(state);

    app.clone()
        .oneshot(webhook_request(Some("wrong"), "{}".into()))
        .await
        .unwrap();
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let text = body_text(response).await;
    assert!(text.contains("# TYPE http_requests_total counter"));
    assert!(text.contains(r#"http_requests_total{endpoint="/webhook",method="POST",status="received"} 1"#));
    assert!(text.contains("http_response_time_seconds"));
}
