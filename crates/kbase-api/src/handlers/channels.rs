//! Stored channels and channel deletion.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use kbase_core::{BulkDeleteRequest, BulkOutcome, DeleteTarget, DependentCount};

use super::relay;
use crate::services::ChannelDeleteTarget;
use crate::{ApiError, AppState, AuthUser};

fn delete_target(state: &AppState, user: &AuthUser) -> ChannelDeleteTarget {
    ChannelDeleteTarget::new(state.channels.clone(), state.backend.clone(), user.caller())
}

pub async fn list_channels(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    let channels = state.channels.list_channels(user.user_id).await?;
    Ok(Json(json!({ "channels": channels })).into_response())
}

/// Dependent-data count shown in the delete confirmation.
pub async fn transcribed_count(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<DependentCount>, ApiError> {
    let count = delete_target(&state, &user).dependent_count(&id).await?;
    Ok(Json(DependentCount { count }))
}

/// A channel the backend no longer knows counts as deleted.
pub async fn delete_channel(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.backend.delete_channel(&user.caller(), &id).await {
        Ok(resp) => Ok(relay(resp).into_response()),
        Err(e) if e.is_not_found() => {
            info!(
                subsystem = "api",
                component = "channels",
                op = "delete",
                channel_id = %id,
                "Channel already deleted"
            );
            Ok(Json(json!({
                "channel_id": id,
                "message": "Channel already deleted",
            }))
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// 200 when every id was deleted, 207 when any failed.
pub async fn bulk_delete(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<BulkDeleteRequest>,
) -> Result<Response, ApiError> {
    if body.channel_ids.is_empty() {
        return Err(ApiError::BadRequest("channel_ids must not be empty".to_string()));
    }

    let target: Arc<dyn DeleteTarget> = Arc::new(delete_target(&state, &user));
    let resp = target.delete_many(&body.channel_ids).await?;
    let outcome = BulkOutcome::from_response(&resp);

    info!(
        subsystem = "api",
        component = "channels",
        op = "bulk_delete",
        user_id = %user.user_id,
        requested = body.channel_ids.len(),
        removed = outcome.removed().len(),
        failed = outcome.failed().len(),
        "Bulk delete finished"
    );

    let status = if outcome.failed().is_empty() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    Ok((status, Json(resp)).into_response())
}
