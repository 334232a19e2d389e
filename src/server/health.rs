//! Liveness and readiness endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::{Value, json};

use crate::types::ChangeEvent;

use super::AppState;

/// `GET /health`: liveness plus dependency status. Always 200; the body
/// says which dependencies are degraded.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let queue_status = match state.queue.check() {
        Ok(()) => "ok",
        Err(_) => "error",
    };
    Json(json!({
        "status": "ok",
        "timestamp": ChangeEvent::format_timestamp(Utc::now()),
        "services": {
            "queue": queue_status,
        },
    }))
}

/// `GET /ready`: fail-closed readiness. 503 while draining or when the
/// queue cannot accept events, so load balancers stop routing first.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.shutdown.is_cancelled() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "draining" })),
        );
    }
    if state.queue.check().is_err() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "queue_unavailable" })),
        );
    }
    (StatusCode::OK, Json(json!({ "status": "ready" })))
}
