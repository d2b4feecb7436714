//! Typed HTTP client for the scrape backend.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use kbase_core::{
    ApiKeyCreateResponse, ApiKeyList, ArticleScrapeResponse, BulkDeleteResponse,
    ChannelDeleteResponse, ChannelPreview, ChannelScraper, DeepMemorySettings, DiscoveryResponse,
    DocumentationRetryResponse, DocumentationScrapeRequest, DocumentationScrapeResponse, Error,
    GenerateResponse, KnowledgeAddRequest, KnowledgeAddResponse, Result, ScrapeTargetRequest,
    TrainResponse, TrainingRunDetail, TrainingRunList,
};

use crate::config::BackendConfig;

/// Identity forwarded to the backend with each call.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    /// Bearer token of the dashboard session, passed through unchanged.
    pub token: Option<String>,
}

impl Caller {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn user_query(&self) -> [(&'static str, String); 1] {
        [("user_id", self.user_id.to_string())]
    }
}

/// A decoded success response together with the backend's status code.
///
/// `raw` is the body exactly as the backend sent it (`null` when empty),
/// including fields `T` does not declare.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse<T> {
    pub status: u16,
    pub body: T,
    pub raw: Value,
}

/// Client for every scrape backend endpoint the dashboard proxies.
#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    stream_client: Client,
    config: BackendConfig,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        // No overall timeout: a job stream stays open for the life of the job.
        let stream_client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        debug!(
            subsystem = "backend",
            component = "client",
            base_url = %config.base_url,
            timeout_secs = config.timeout.as_secs(),
            "Initializing scrape backend client"
        );

        Ok(Self {
            client,
            stream_client,
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(BackendConfig::from_env())
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Build an endpoint URL; `ids` are appended as percent-encoded segments.
    fn url(&self, path: &str, ids: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.endpoint(path))
            .map_err(|e| Error::Config(format!("Invalid backend URL: {}", e)))?;
        if !ids.is_empty() {
            url.path_segments_mut()
                .map_err(|_| Error::Config("Backend URL cannot have path segments".to_string()))?
                .extend(ids);
        }
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        op: &'static str,
        req: RequestBuilder,
    ) -> Result<BackendResponse<T>> {
        let start = Instant::now();
        let response = req.send().await.map_err(|e| {
            warn!(subsystem = "backend", op, error = %e, "Backend unreachable");
            Error::Request(format!("Backend unreachable: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                subsystem = "backend",
                op,
                status = status.as_u16(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Backend returned error status"
            );
            return Err(Error::upstream(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        let raw: Value = if bytes.is_empty() || status == StatusCode::NO_CONTENT {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        let body = serde_json::from_value(raw.clone())?;

        debug!(
            subsystem = "backend",
            op,
            status = status.as_u16(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Backend call complete"
        );
        Ok(BackendResponse {
            status: status.as_u16(),
            body,
            raw,
        })
    }

    // =========================================================================
    // KNOWLEDGE
    // =========================================================================

    /// Queue transcription of the selected videos.
    pub async fn add_videos(
        &self,
        caller: &Caller,
        mut req: KnowledgeAddRequest,
    ) -> Result<BackendResponse<KnowledgeAddResponse>> {
        req.user_id = Some(caller.user_id.to_string());
        let url = self.url("/v1/api/knowledge/youtube/add", &[])?;
        self.send("knowledge_add", caller.authorize(self.client.post(url).json(&req)))
            .await
    }

    pub async fn delete_channel(
        &self,
        caller: &Caller,
        channel_id: &str,
    ) -> Result<BackendResponse<ChannelDeleteResponse>> {
        let url = self.url("/v1/api/knowledge/channels", &[channel_id])?;
        let req = self.client.delete(url).query(&caller.user_query());
        self.send("channel_delete", caller.authorize(req)).await
    }

    pub async fn bulk_delete_channels(
        &self,
        caller: &Caller,
        channel_ids: &[String],
    ) -> Result<BackendResponse<BulkDeleteResponse>> {
        let url = self.url("/v1/api/knowledge/channels/bulk-delete", &[])?;
        let body = json!({ "user_id": caller.user_id, "channel_ids": channel_ids });
        self.send("channel_bulk_delete", caller.authorize(self.client.post(url).json(&body)))
            .await
    }

    // =========================================================================
    // ARTICLES / DOCUMENTATION
    // =========================================================================

    pub async fn scrape_article(
        &self,
        caller: &Caller,
        mut req: ScrapeTargetRequest,
    ) -> Result<BackendResponse<ArticleScrapeResponse>> {
        req.user_id = Some(caller.user_id.to_string());
        let url = self.url("/v1/api/articles/scrape", &[])?;
        self.send("article_scrape", caller.authorize(self.client.post(url).json(&req)))
            .await
    }

    pub async fn delete_article(
        &self,
        caller: &Caller,
        article_id: &str,
    ) -> Result<BackendResponse<Value>> {
        let url = self.url("/v1/api/articles", &[article_id])?;
        let req = self.client.delete(url).query(&caller.user_query());
        self.send("article_delete", caller.authorize(req)).await
    }

    pub async fn discover_documentation(
        &self,
        caller: &Caller,
        mut req: ScrapeTargetRequest,
    ) -> Result<BackendResponse<DiscoveryResponse>> {
        req.user_id = Some(caller.user_id.to_string());
        let url = self.url("/v1/api/documentation/discover", &[])?;
        self.send("docs_discover", caller.authorize(self.client.post(url).json(&req)))
            .await
    }

    pub async fn scrape_documentation(
        &self,
        caller: &Caller,
        mut req: DocumentationScrapeRequest,
    ) -> Result<BackendResponse<DocumentationScrapeResponse>> {
        req.user_id = Some(caller.user_id.to_string());
        let url = self.url("/v1/api/documentation/scrape", &[])?;
        self.send("docs_scrape", caller.authorize(self.client.post(url).json(&req)))
            .await
    }

    pub async fn retry_documentation(
        &self,
        caller: &Caller,
        collection_id: &str,
    ) -> Result<BackendResponse<DocumentationRetryResponse>> {
        let url = self.url("/v1/api/documentation", &[collection_id, "retry"])?;
        let body = json!({ "user_id": caller.user_id });
        self.send("docs_retry", caller.authorize(self.client.post(url).json(&body)))
            .await
    }

    pub async fn delete_documentation(
        &self,
        caller: &Caller,
        collection_id: &str,
    ) -> Result<BackendResponse<Value>> {
        let url = self.url("/v1/api/documentation", &[collection_id])?;
        let body = json!({ "user_id": caller.user_id });
        self.send("docs_delete", caller.authorize(self.client.delete(url).json(&body)))
            .await
    }

    // =========================================================================
    // DEEP MEMORY
    // =========================================================================

    pub async fn generate_training_data(
        &self,
        caller: &Caller,
    ) -> Result<BackendResponse<GenerateResponse>> {
        let url = self.url("/v1/api/deep-memory/generate", &[])?;
        let body = json!({ "user_id": caller.user_id });
        self.send("deep_memory_generate", caller.authorize(self.client.post(url).json(&body)))
            .await
    }

    pub async fn start_training(
        &self,
        caller: &Caller,
        training_run_id: &str,
    ) -> Result<BackendResponse<TrainResponse>> {
        let url = self.url("/v1/api/deep-memory/train", &[])?;
        let body = json!({ "user_id": caller.user_id, "training_run_id": training_run_id });
        self.send("deep_memory_train", caller.authorize(self.client.post(url).json(&body)))
            .await
    }

    /// Resume a failed run under a new job.
    pub async fn proceed_training(
        &self,
        caller: &Caller,
        training_run_id: &str,
    ) -> Result<BackendResponse<TrainResponse>> {
        let url = self.url("/v1/api/deep-memory/proceed", &[])?;
        let body = json!({ "user_id": caller.user_id, "training_run_id": training_run_id });
        self.send("deep_memory_proceed", caller.authorize(self.client.post(url).json(&body)))
            .await
    }

    pub async fn list_training_runs(
        &self,
        caller: &Caller,
    ) -> Result<BackendResponse<TrainingRunList>> {
        let url = self.url("/v1/api/deep-memory/runs", &[])?;
        let req = self.client.get(url).query(&caller.user_query());
        self.send("deep_memory_runs", caller.authorize(req)).await
    }

    pub async fn get_training_run(
        &self,
        caller: &Caller,
        run_id: &str,
    ) -> Result<BackendResponse<TrainingRunDetail>> {
        let url = self.url("/v1/api/deep-memory/runs", &[run_id])?;
        let req = self.client.get(url).query(&caller.user_query());
        self.send("deep_memory_run", caller.authorize(req)).await
    }

    pub async fn delete_training_run(
        &self,
        caller: &Caller,
        run_id: &str,
    ) -> Result<BackendResponse<Value>> {
        let url = self.url("/v1/api/deep-memory/runs", &[run_id])?;
        let req = self.client.delete(url).query(&caller.user_query());
        self.send("deep_memory_run_delete", caller.authorize(req))
            .await
    }

    pub async fn get_deep_memory_settings(
        &self,
        caller: &Caller,
    ) -> Result<BackendResponse<DeepMemorySettings>> {
        let url = self.url("/v1/api/deep-memory/settings", &[])?;
        let req = self.client.get(url).query(&caller.user_query());
        self.send("deep_memory_settings", caller.authorize(req)).await
    }

    pub async fn update_deep_memory_settings(
        &self,
        caller: &Caller,
        enabled: bool,
    ) -> Result<BackendResponse<Value>> {
        let url = self.url("/v1/api/deep-memory/settings", &[])?;
        let body = json!({ "user_id": caller.user_id, "enabled": enabled });
        self.send("deep_memory_settings_update", caller.authorize(self.client.put(url).json(&body)))
            .await
    }

    // =========================================================================
    // API KEYS
    // =========================================================================

    pub async fn create_api_key(
        &self,
        caller: &Caller,
        name: &str,
    ) -> Result<BackendResponse<ApiKeyCreateResponse>> {
        let url = self.url("/v1/api/keys", &[])?;
        let body = json!({ "user_id": caller.user_id, "name": name });
        self.send("api_key_create", caller.authorize(self.client.post(url).json(&body)))
            .await
    }

    pub async fn list_api_keys(&self, caller: &Caller) -> Result<BackendResponse<ApiKeyList>> {
        let url = self.url("/v1/api/keys", &[])?;
        let req = self.client.get(url).query(&caller.user_query());
        self.send("api_key_list", caller.authorize(req)).await
    }

    pub async fn revoke_api_key(
        &self,
        caller: &Caller,
        key_id: &str,
    ) -> Result<BackendResponse<Value>> {
        let url = self.url("/v1/api/keys", &[key_id])?;
        let req = self.client.delete(url).query(&caller.user_query());
        self.send("api_key_revoke", caller.authorize(req)).await
    }

    // =========================================================================
    // JOB EVENTS
    // =========================================================================

    /// Open the event stream for a job.
    ///
    /// Returns the live response; callers read it with `bytes_stream()` and
    /// decode it with [`crate::sse::SseDecoder`].
    pub async fn open_job_stream(
        &self,
        job_id: &str,
        last_event_id: Option<&str>,
    ) -> Result<reqwest::Response> {
        let url = self.url("/v1/api/events/stream", &[job_id])?;
        let mut req = self
            .stream_client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(id) = last_event_id {
            req = req.header("Last-Event-ID", id);
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Request(format!("Event stream connect failed: {}", e)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::upstream(status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ChannelScraper for BackendClient {
    async fn scrape_channel(&self, raw_url: &str) -> Result<ChannelPreview> {
        let url = self.url("/v1/api/youtube/preview", &[])?;
        let req = self.client.get(url).query(&[("url", raw_url)]);
        Ok(self.send("youtube_preview", req).await?.body)
    }
}
