//! Bearer-token authentication.
//!
//! Every `/api` route resolves the session token to a user id through an
//! [`Authenticator`]. The production implementation asks the auth provider
//! (`GET {AUTH_URL}/auth/v1/user`); tests plug in their own.

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::{header, request::Parts};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use kbase_backend::Caller;
use kbase_core::{Error, Result};

use crate::{ApiError, AppState};

/// Resolves a bearer token to a user id.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `Error::Unauthorized` for missing, expired or unknown tokens.
    async fn authenticate(&self, token: &str) -> Result<Uuid>;
}

#[derive(Debug, Deserialize)]
struct AuthUserBody {
    id: Uuid,
}

/// Authenticator backed by the hosted auth provider.
#[derive(Clone)]
pub struct RemoteAuthenticator {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RemoteAuthenticator {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create auth client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Authenticator for RemoteAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Uuid> {
        let url = format!("{}/auth/v1/user", self.base_url.trim_end_matches('/'));
        let mut req = self.client.get(url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }

        let response = req.send().await.map_err(|e| {
            warn!(subsystem = "api", component = "auth", error = %e, "Auth provider unreachable");
            Error::Request(format!("Auth provider unreachable: {}", e))
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Unauthorized("Invalid or expired session".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(status.as_u16(), body));
        }

        let user: AuthUserBody = response.json().await?;
        debug!(subsystem = "api", component = "auth", user_id = %user.id, "Session resolved");
        Ok(user.id)
    }
}

/// Authenticated caller, extracted from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub token: String,
}

impl AuthUser {
    /// Identity forwarded to the scrape backend.
    pub fn caller(&self) -> Caller {
        Caller::new(self.user_id).with_token(self.token.clone())
    }

    async fn resolve(state: &AppState, token: Option<String>) -> std::result::Result<Self, ApiError> {
        let token = token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;
        let user_id = state.auth.authenticate(&token).await?;
        Ok(AuthUser { user_id, token })
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        AuthUser::resolve(state, bearer_token(parts)).await
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    access_token: Option<String>,
}

/// Caller of an event stream route.
///
/// Browsers' `EventSource` cannot set headers, so the token may also arrive
/// as `?access_token=`. The header wins when both are present.
#[derive(Debug, Clone)]
pub struct StreamUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for StreamUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = bearer_token(parts).or_else(|| {
            Query::<TokenQuery>::try_from_uri(&parts.uri)
                .ok()
                .and_then(|Query(q)| q.access_token)
        });
        AuthUser::resolve(state, token).await.map(StreamUser)
    }
}
