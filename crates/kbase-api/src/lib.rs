//! # kbase-api
//!
//! HTTP surface of the kbase dashboard service: channel previews backed by
//! the per-day cache, cookie file management, the job event relay, and
//! authenticated proxies to the scrape backend.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use uuid::Uuid;

use kbase_backend::BackendClient;
use kbase_core::{
    CategoryRepository, ChannelCacheRepository, ChannelScraper, CookieRepository, HostResolver,
    StorageBackend,
};
use kbase_db::{
    CategoryCache, Database, FilesystemBackend, MemoryCategories, MemoryChannelCache,
    MemoryCookies, MemoryStorage,
};
use kbase_jobs::JobStreamClient;

pub use auth::{AuthUser, Authenticator, RemoteAuthenticator, StreamUser};
pub use config::{ApiConfig, StorageKind};
pub use error::ApiError;
pub use services::{ChannelPreviewService, CookieIngestService, DnsResolver};

/// Storage implementations the service runs on.
#[derive(Clone)]
pub struct Stores {
    pub channels: Arc<dyn ChannelCacheRepository>,
    pub categories: Arc<dyn CategoryRepository>,
    pub cookies: Arc<dyn CookieRepository>,
    pub files: Arc<dyn StorageBackend>,
}

impl Stores {
    pub fn postgres(db: &Database, files: FilesystemBackend) -> Self {
        Self {
            channels: Arc::new(db.channels.clone()),
            categories: Arc::new(db.categories.clone()),
            cookies: Arc::new(db.cookies.clone()),
            files: Arc::new(files),
        }
    }

    /// Process-local stores with the seeded category table.
    pub fn memory() -> Self {
        let categories = MemoryCategories::seeded();
        Self {
            channels: Arc::new(MemoryChannelCache::new(categories.clone())),
            categories: Arc::new(categories),
            cookies: Arc::new(MemoryCookies::new()),
            files: Arc::new(MemoryStorage::new()),
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub channels: Arc<dyn ChannelCacheRepository>,
    pub preview: Arc<ChannelPreviewService>,
    pub cookies: Arc<CookieIngestService>,
    pub backend: BackendClient,
    /// Subscriptions to backend job event streams.
    pub streams: JobStreamClient,
    pub auth: Arc<dyn Authenticator>,
    /// DNS lookups for scrape target checks.
    pub resolver: Arc<dyn HostResolver>,
}

impl AppState {
    pub fn new(
        config: ApiConfig,
        stores: Stores,
        backend: BackendClient,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        let categories = Arc::new(CategoryCache::new(stores.categories));
        let scraper: Arc<dyn ChannelScraper> = Arc::new(backend.clone());
        let preview = ChannelPreviewService::new(stores.channels.clone(), categories, scraper);
        let cookies = CookieIngestService::new(stores.cookies, stores.files)
            .with_policy(config.cookie_expiry_policy)
            .with_max_per_user(config.max_cookies_per_user);

        Self {
            config: Arc::new(config),
            channels: stores.channels,
            preview: Arc::new(preview),
            cookies: Arc::new(cookies),
            streams: JobStreamClient::new(backend.clone()),
            backend,
            auth,
            resolver: Arc::new(DnsResolver),
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = resolver;
        self
    }
}

/// Request ids for tracing, UUIDv7 so they sort by time.
#[derive(Clone, Copy)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(subsystem = "api", origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Build the router with every route and middleware layer.
pub fn build_app(state: AppState) -> Router {
    use handlers::*;

    let max_body = state.config.max_body_bytes;
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/health", get(health_check))
        // Channel preview and knowledge
        .route("/api/youtube/preview", get(preview::get_preview))
        .route("/api/knowledge/youtube/add", post(knowledge::add_videos))
        .route("/api/events/stream/:job_id", get(events::stream_job))
        // Channels
        .route("/api/channels", get(channels::list_channels))
        .route("/api/channels/bulk-delete", post(channels::bulk_delete))
        .route(
            "/api/channels/:id/transcribed-count",
            get(channels::transcribed_count),
        )
        .route("/api/channels/:id", delete(channels::delete_channel))
        // Cookies
        .route(
            "/api/cookies",
            get(cookies::list_cookies)
                .post(cookies::upload_cookie)
                .delete(cookies::delete_cookie),
        )
        .route("/api/cookies/check", get(cookies::check_cookies))
        // Articles and documentation
        .route("/api/articles/scrape", post(articles::scrape_article))
        .route("/api/articles/:id", delete(articles::delete_article))
        .route(
            "/api/documentation/discover",
            post(documentation::discover),
        )
        .route("/api/documentation/scrape", post(documentation::scrape))
        .route("/api/documentation/:id/retry", post(documentation::retry))
        .route("/api/documentation/:id", delete(documentation::delete_collection))
        // Deep memory
        .route("/api/deep-memory/generate", post(deep_memory::generate))
        .route("/api/deep-memory/train", post(deep_memory::train))
        .route("/api/deep-memory/proceed", post(deep_memory::proceed))
        .route(
            "/api/deep-memory/settings",
            get(deep_memory::get_settings).put(deep_memory::update_settings),
        )
        .route("/api/deep-memory/runs", get(deep_memory::list_runs))
        .route(
            "/api/deep-memory/runs/:id",
            get(deep_memory::get_run).delete(deep_memory::delete_run),
        )
        // API keys
        .route(
            "/api/keys",
            get(keys::list_keys)
                .post(keys::create_key)
                .delete(keys::revoke_key),
        )
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(RequestBodyLimitLayer::new(max_body))
        .with_state(state)
}
