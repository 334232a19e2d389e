//! The webhook ingestion HTTP server.
//!
//! Three routes: `POST /webhook` accepts push notifications and enqueues
//! change events, `GET /health` reports liveness, and `GET /ready` reports
//! readiness fail-closed. The handler never talks to the document provider
//! or object storage; acceptance means only that the event is durably
//! queued.

use std::net::IpAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;

use crate::queue::WorkQueue;

pub mod guard;
pub mod health;
pub mod webhook;

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub queue: WorkQueue,
    pub verification_token: Arc<str>,
    pub allowed_addrs: Arc<[IpAddr]>,
    pub shutdown: CancellationToken,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}
