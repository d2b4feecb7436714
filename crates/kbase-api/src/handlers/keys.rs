//! API key management proxies.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use kbase_core::ApiKeyCreateRequest;

use super::{relay, Proxied};
use crate::{ApiError, AppState, AuthUser};

#[derive(Debug, Deserialize)]
pub struct RevokeQuery {
    pub key_id: Option<String>,
}

pub async fn list_keys(
    State(state): State<AppState>,
    user: AuthUser,
) -> Proxied {
    Ok(relay(state.backend.list_api_keys(&user.caller()).await?))
}

/// The full key only appears in this response.
pub async fn create_key(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ApiKeyCreateRequest>,
) -> Proxied {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    Ok(relay(state.backend.create_api_key(&user.caller(), name).await?))
}

pub async fn revoke_key(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<RevokeQuery>,
) -> Result<Response, ApiError> {
    let key_id = query
        .key_id
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("key_id required".to_string()))?;

    let resp = state
        .backend
        .revoke_api_key(&user.caller(), key_id.trim())
        .await?;
    if resp.status == StatusCode::NO_CONTENT.as_u16() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    if resp.raw.is_null() {
        let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK);
        return Ok((status, Json(json!({ "success": true }))).into_response());
    }
    Ok(relay(resp).into_response())
}
