//! HTTP surface: Telegram webhook, health check and Prometheus metrics.
//!
//! Each endpoint is a thin axum handler over an inner function that can be
//! called directly in tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use teloxide::types::Update;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::bot::Pipeline;
use crate::config::Config;
use crate::metrics::Metrics;
use crate::store::KeyValueStore;

pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

const WEBHOOK: &str = "/webhook";

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub pipeline: Pipeline,
    pub webhook_secret: String,
    pub store: Arc<dyn KeyValueStore>,
    pub metrics: Metrics,
}

pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route(WEBHOOK, post(webhook_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    state: Arc<HttpState>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Web server started on {}", addr);
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given.iter().zip(expected).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

// ============================================================================
// Inner functions
// ============================================================================

/// Authenticate, decode and process one update.
pub async fn webhook_inner(state: &HttpState, secret: Option<&[u8]>, body: &[u8]) -> StatusCode {
    let started = Instant::now();
    state.metrics.count("POST", WEBHOOK, "received");

    if !secret.is_some_and(|s| secrets_match(s, state.webhook_secret.as_bytes())) {
        warn!("Webhook call with invalid secret token");
        state.metrics.count("POST", WEBHOOK, "invalid_token");
        return StatusCode::FORBIDDEN;
    }

    let update: Update = match serde_json::from_slice(body) {
        Ok(update) => update,
        Err(e) => {
            error!("Webhook error: {e}");
            state.metrics.count("POST", WEBHOOK, "error");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    state.pipeline.process_update(&update).await;

    state.metrics.observe(started.elapsed());
    state.metrics.count("POST", WEBHOOK, "success");
    StatusCode::OK
}

pub async fn health_inner(store: &dyn KeyValueStore) -> (StatusCode, serde_json::Value) {
    let redis = match store.ping().await {
        Ok(up) => up,
        Err(e) => {
            warn!("Health check ping failed: {e}");
            false
        }
    };
    let status = if redis {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        serde_json::json!({
            "status": "ok",
            "version": Config::version(),
            "redis": redis,
        }),
    )
}

// ============================================================================
// Axum handlers
// ============================================================================

async fn webhook_handler(State(state): State<Arc<HttpState>>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let secret = headers.get(SECRET_HEADER).map(|v| v.as_bytes());
    webhook_inner(&state, secret, &body).await
}

async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref()).await;
    (status, Json(body))
}

async fn metrics_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    match state.metrics.render() {
        Ok(text) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text),
        Err(e) => {
            error!("Metrics encoding failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                String::new(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_match() {
        assert!(secrets_match(b"s3cret", b"s3cret"));
        assert!(!secrets_match(b"s3cret", b"s3creT"));
        assert!(!secrets_match(b"s3cre", b"s3cret"));
        assert!(!secrets_match(b"", b"s3cret"));
    }
}
