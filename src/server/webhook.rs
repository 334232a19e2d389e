//! The `POST /webhook` handler.

use std::net::SocketAddr;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::ChangeEvent;

use super::AppState;
use super::guard;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error(transparent)]
    Refused(#[from] guard::Rejection),

    #[error("failed to enqueue event: {0}")]
    Publish(#[from] crate::queue::QueueError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Refused(rejection) => rejection.status(),
            WebhookError::Publish(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        // Callers get the rejection reason; enqueue internals stay in the logs.
        let message = match &self {
            WebhookError::Refused(rejection) => rejection.to_string(),
            WebhookError::Publish(_) => "internal error".to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Body of a successful webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    pub event_id: String,
    pub timestamp: String,
}

/// Accepts a push notification, validates it, and enqueues a change event.
///
/// Every validated notification is published, including the channel's
/// initial `sync` message; the worker treats the resource state as a hint
/// and re-lists the folder either way.
pub async fn handle(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<WebhookAck>, WebhookError> {
    let received_at = Utc::now();
    let notification = guard::validate(
        &headers,
        client.ip(),
        &state.verification_token,
        &state.allowed_addrs,
    )
    .inspect_err(|rejection| {
        warn!(client = %client, %rejection, "webhook refused");
    })?;

    let event = ChangeEvent::push(
        notification.channel_id,
        notification.resource_state,
        notification.resource_id,
        Some(client.ip()),
        received_at,
    );
    state.queue.publish(&event)?;
    info!(
        event_id = %event.event_id,
        resource_state = %event.resource_state,
        "webhook event enqueued"
    );

    Ok(Json(WebhookAck {
        status: "queued",
        event_id: event.event_id.to_string(),
        timestamp: event.timestamp_rfc3339(),
    }))
}
