//! Cookie file management.

use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use kbase_core::{CookieCheck, CookieRecord};

use crate::{ApiError, AppState, AuthUser};

/// Cookie record as shown to the dashboard; storage paths stay server-side.
#[derive(Debug, Serialize)]
pub struct CookieView {
    pub id: Uuid,
    pub domain: String,
    pub filename: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CookieRecord> for CookieView {
    fn from(r: CookieRecord) -> Self {
        Self {
            id: r.id,
            domain: r.domain,
            filename: r.filename,
            expires_at: r.expires_at,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: Option<String>,
}

pub async fn list_cookies(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let cookies: Vec<CookieView> = state
        .cookies
        .list(user.user_id)
        .await?
        .into_iter()
        .map(CookieView::from)
        .collect();
    Ok(Json(json!({ "cookies": cookies })))
}

/// Multipart upload; the file goes in field `file`.
pub async fn upload_cookie(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart data: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
        upload = Some((filename, data.to_vec()));
    }

    let (filename, data) =
        upload.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;
    let record = state.cookies.upload(user.user_id, &filename, &data).await?;
    Ok(Json(json!({ "cookie": CookieView::from(record) })))
}

pub async fn delete_cookie(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<IdQuery>,
) -> Result<Json<Value>, ApiError> {
    let raw = query
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("id parameter is required".to_string()))?;
    let id = Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::BadRequest("Invalid cookie id".to_string()))?;

    state.cookies.delete(user.user_id, id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn check_cookies(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UrlQuery>,
) -> Result<Json<CookieCheck>, ApiError> {
    let url = query
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("url parameter is required".to_string()))?;
    Ok(Json(state.cookies.has_cookies_for(user.user_id, url.trim()).await?))
}
