//! Single-article scraping and deletion.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::info;

use kbase_core::{check_url_resolved, ScrapeTargetRequest};

use super::{relay, Proxied};
use crate::{ApiError, AppState, AuthUser};

pub async fn scrape_article(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ScrapeTargetRequest>,
) -> Proxied {
    check_url_resolved(&body.url, state.resolver.as_ref()).await?;
    let resp = state.backend.scrape_article(&user.caller(), body).await?;
    Ok(relay(resp))
}

/// An article the backend no longer knows counts as deleted.
pub async fn delete_article(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    match state.backend.delete_article(&user.caller(), &id).await {
        Ok(resp) if resp.raw.is_null() => Ok(Json(json!({
            "article_id": id,
            "message": "Article deleted",
        }))
        .into_response()),
        Ok(resp) => Ok(relay(resp).into_response()),
        Err(e) if e.is_not_found() => {
            info!(
                subsystem = "api",
                component = "articles",
                op = "delete",
                article_id = %id,
                "Article already deleted"
            );
            Ok(Json(json!({
                "article_id": id,
                "message": "Article already deleted",
            }))
            .into_response())
        }
        Err(e) => Err(e.into()),
    }
}
