//! Deep-memory training proxies.

use axum::{
    extract::{Path, State},
    Json,
};

use kbase_core::{TrainingRunRef, UpdateSettingsRequest};

use super::{relay, Proxied};
use crate::{ApiError, AppState, AuthUser};

fn require_run_id(body: &TrainingRunRef) -> Result<&str, ApiError> {
    let id = body.training_run_id.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("training_run_id is required".to_string()));
    }
    Ok(id)
}

pub async fn generate(State(state): State<AppState>, user: AuthUser) -> Proxied {
    Ok(relay(state.backend.generate_training_data(&user.caller()).await?))
}

pub async fn train(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<TrainingRunRef>,
) -> Proxied {
    let run_id = require_run_id(&body)?;
    Ok(relay(state.backend.start_training(&user.caller(), run_id).await?))
}

/// Resume a failed run as a new training job.
pub async fn proceed(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<TrainingRunRef>,
) -> Proxied {
    let run_id = require_run_id(&body)?;
    Ok(relay(state.backend.proceed_training(&user.caller(), run_id).await?))
}

pub async fn get_settings(
    State(state): State<AppState>,
    user: AuthUser,
) -> Proxied {
    Ok(relay(state.backend.get_deep_memory_settings(&user.caller()).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<UpdateSettingsRequest>,
) -> Proxied {
    Ok(relay(
        state
            .backend
            .update_deep_memory_settings(&user.caller(), body.enabled)
            .await?,
    ))
}

pub async fn list_runs(State(state): State<AppState>, user: AuthUser) -> Proxied {
    Ok(relay(state.backend.list_training_runs(&user.caller()).await?))
}

pub async fn get_run(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Proxied {
    Ok(relay(state.backend.get_training_run(&user.caller(), &id).await?))
}

pub async fn delete_run(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Proxied {
    Ok(relay(state.backend.delete_training_run(&user.caller(), &id).await?))
}
