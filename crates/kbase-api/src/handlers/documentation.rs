//! Documentation site discovery, scraping and collection management.

use axum::{
    extract::{Path, State},
    Json,
};

use kbase_core::{check_url_resolved, DocumentationScrapeRequest, ScrapeTargetRequest};

use super::{relay, Proxied};
use crate::{ApiError, AppState, AuthUser};

pub async fn discover(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<ScrapeTargetRequest>,
) -> Proxied {
    check_url_resolved(&body.url, state.resolver.as_ref()).await?;
    let resp = state
        .backend
        .discover_documentation(&user.caller(), body)
        .await?;
    Ok(relay(resp))
}

/// Every page URL is checked, not only the entry point.
pub async fn scrape(
    State(state): State<AppState>,
    user: AuthUser,
    Json(body): Json<DocumentationScrapeRequest>,
) -> Proxied {
    if body.pages.is_empty() {
        return Err(ApiError::BadRequest("No pages selected".to_string()));
    }
    check_url_resolved(&body.entry_url, state.resolver.as_ref()).await?;
    for page in &body.pages {
        check_url_resolved(&page.url, state.resolver.as_ref()).await?;
    }
    let resp = state
        .backend
        .scrape_documentation(&user.caller(), body)
        .await?;
    Ok(relay(resp))
}

pub async fn retry(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Proxied {
    let resp = state
        .backend
        .retry_documentation(&user.caller(), &id)
        .await?;
    Ok(relay(resp))
}

pub async fn delete_collection(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Proxied {
    let resp = state
        .backend
        .delete_documentation(&user.caller(), &id)
        .await?;
    Ok(relay(resp))
}
