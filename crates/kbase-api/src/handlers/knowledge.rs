//! Queue selected videos for transcription.

use axum::{extract::State, Json};

use kbase_core::KnowledgeAddRequest;

use super::{relay, Proxied};
use crate::{ApiError, AppState, AuthUser};

pub async fn add_videos(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<KnowledgeAddRequest>,
) -> Proxied {
    if body.videos.is_empty() {
        return Err(ApiError::BadRequest("No videos selected".to_string()));
    }
    let resp = state.backend.add_videos(&user.caller(), body).await?;
    tracing::info!(
        subsystem = "api",
        component = "knowledge",
        op = "add_videos",
        user_id = %user.user_id,
        job_id = %resp.body.job_id,
        total_videos = resp.body.total_videos,
        "Transcription job queued"
    );
    Ok(relay(resp))
}
