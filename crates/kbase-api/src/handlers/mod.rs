//! HTTP handlers, one module per route group.

pub mod articles;
pub mod channels;
pub mod cookies;
pub mod deep_memory;
pub mod documentation;
pub mod events;
pub mod keys;
pub mod knowledge;
pub mod preview;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

use kbase_backend::BackendResponse;

/// Liveness probe; no auth.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Backend status and body, relayed unchanged.
pub(crate) type Proxied = Result<(StatusCode, Json<Value>), crate::ApiError>;

/// Relay a backend success response with its original status and body.
pub(crate) fn relay<T>(resp: BackendResponse<T>) -> (StatusCode, Json<Value>) {
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK);
    (status, Json(resp.raw))
}
