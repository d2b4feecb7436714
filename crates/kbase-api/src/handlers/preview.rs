//! Channel preview handler.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;

use crate::services::{ChannelPage, PageRequest};
use crate::{ApiError, AppState, AuthUser};

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub url: Option<String>,
    /// Kept as strings so non-numeric values fall back to defaults.
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
    pub category: Option<String>,
}

pub async fn get_preview(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<ChannelPage>, ApiError> {
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::BadRequest("url parameter is required".to_string()))?;
    let page = PageRequest::parse(query.page.as_deref(), query.page_size.as_deref());

    let result = state
        .preview
        .get_channel_page(user.user_id, url, page, query.category.as_deref())
        .await?;
    Ok(Json(result))
}
