//! Core data models for kbase.
//!
//! Wire types exchanged with the scrape backend and the dashboard, and the
//! strongly-typed records decoded from storage rows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// JOB TYPES
// =============================================================================

/// Kind of long-running backend job tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Transcribe and vectorize selected channel videos.
    MediaAdd,
    /// Scrape a single web article.
    ArticleScrape,
    /// Scrape every discovered page of a documentation site.
    DocumentationScrape,
    /// Re-scrape the failed pages of a documentation collection.
    DocumentationRetry,
    /// Generate deep-memory training pairs.
    DeepMemoryGenerate,
    /// Train the deep-memory index from generated pairs.
    DeepMemoryTrain,
}

impl JobKind {
    /// Units counted by this kind's progress counters.
    pub fn unit(&self) -> &'static str {
        match self {
            JobKind::MediaAdd => "videos",
            JobKind::ArticleScrape => "articles",
            JobKind::DocumentationScrape | JobKind::DocumentationRetry => "pages",
            JobKind::DeepMemoryGenerate | JobKind::DeepMemoryTrain => "chunks",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobKind::MediaAdd => "media_add",
            JobKind::ArticleScrape => "article_scrape",
            JobKind::DocumentationScrape => "documentation_scrape",
            JobKind::DocumentationRetry => "documentation_retry",
            JobKind::DeepMemoryGenerate => "deep_memory_generate",
            JobKind::DeepMemoryTrain => "deep_memory_train",
        };
        f.write_str(s)
    }
}

/// Status pushed by the backend for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Generating,
    Generated,
    Training,
    Completed,
    Failed,
    GeneratingFailed,
    TrainingFailed,
    /// Any status string this service does not know; treated as non-terminal.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Completed-class terminal status.
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Generated)
    }

    /// Failed-class terminal status, including the kind-specific variants.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed | JobStatus::GeneratingFailed | JobStatus::TrainingFailed
        )
    }

    /// No further events are expected once a job reaches a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

/// One `job_update` payload from the backend event stream.
///
/// Counter fields are optional because each job kind reports a different
/// unit (videos, pages, or chunks).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobUpdate {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_videos: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_videos: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub succeeded_videos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_videos: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_pages: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub succeeded_pages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_pages: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_chunks: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_count: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, f64>>,
}

impl JobUpdate {
    /// Minimal update with only id and status set.
    pub fn new(id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            progress: 0.0,
            message: String::new(),
            error_message: None,
            total_videos: None,
            processed_videos: None,
            succeeded_videos: Vec::new(),
            failed_videos: Vec::new(),
            total_pages: None,
            processed_pages: None,
            succeeded_pages: Vec::new(),
            failed_pages: Vec::new(),
            total_chunks: None,
            processed_chunks: None,
            pair_count: None,
            metrics: None,
        }
    }

    /// Progress rounded and clamped to 0..=100.
    pub fn percent(&self) -> u8 {
        if !self.progress.is_finite() {
            return 0;
        }
        self.progress.round().clamp(0.0, 100.0) as u8
    }

    /// `(processed, total)` for whichever unit the backend reported.
    pub fn counters(&self) -> Option<(i64, i64)> {
        [
            (self.processed_videos, self.total_videos),
            (self.processed_pages, self.total_pages),
            (self.processed_chunks, self.total_chunks),
        ]
        .into_iter()
        .find_map(|(p, t)| match (p, t) {
            (Some(p), Some(t)) => Some((p, t)),
            _ => None,
        })
    }

    /// Ids of items that succeeded, whatever the unit.
    pub fn succeeded_ids(&self) -> &[String] {
        if self.succeeded_pages.is_empty() {
            &self.succeeded_videos
        } else {
            &self.succeeded_pages
        }
    }

    /// Ids of items that failed, whatever the unit.
    pub fn failed_ids(&self) -> &[String] {
        if self.failed_pages.is_empty() {
            &self.failed_videos
        } else {
            &self.failed_pages
        }
    }

    /// Best human-readable error for a failed job.
    pub fn error_text(&self) -> String {
        match (&self.error_message, self.message.is_empty()) {
            (Some(e), _) if !e.is_empty() => e.clone(),
            (_, false) => self.message.clone(),
            _ => "Unknown error".to_string(),
        }
    }
}

// =============================================================================
// CHANNEL PREVIEW / CACHE TYPES
// =============================================================================

/// One video row as returned by the scrape backend and served in previews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_transcribed: bool,
}

/// Channel preview payload (backend scrape result and preview response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelPreview {
    pub channel_title: String,
    pub channel_url: String,
    pub total_videos: i64,
    #[serde(default)]
    pub categories: BTreeMap<String, i64>,
    #[serde(default)]
    pub videos: Vec<PreviewVideo>,
}

/// A cached channel row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedChannel {
    pub id: Uuid,
    pub user_id: Uuid,
    pub channel_title: String,
    pub channel_url: String,
    pub total_videos: i64,
    pub last_scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Channel metadata to upsert after a scrape.
#[derive(Debug, Clone)]
pub struct NewChannel {
    pub channel_title: String,
    /// Canonical URL (cache key).
    pub channel_url: String,
    pub total_videos: i64,
}

/// Video row to upsert after a scrape.
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub views: i64,
    pub category_id: Option<i32>,
}

/// A stored video row joined with its category name.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRow {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub views: i64,
    pub category_id: Option<i32>,
    pub category: Option<String>,
    pub is_transcribed: bool,
}

impl From<VideoRow> for PreviewVideo {
    fn from(row: VideoRow) -> Self {
        Self {
            video_id: row.video_id,
            title: row.title,
            url: row.url,
            views: row.views,
            category: row
                .category
                .unwrap_or_else(|| crate::defaults::UNKNOWN_CATEGORY.to_string()),
            is_transcribed: row.is_transcribed,
        }
    }
}

/// One page of stored videos, ordered by views descending.
#[derive(Debug, Clone, Default)]
pub struct VideoPage {
    pub rows: Vec<VideoRow>,
    /// Row count matching the query before offset/limit.
    pub total: i64,
}

/// Lookup row for the shared category table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

// =============================================================================
// COOKIE TYPES
// =============================================================================

/// Stored cookie file record, one per (user, domain).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub domain: String,
    pub filename: String,
    pub file_path: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Cookie record to insert.
#[derive(Debug, Clone)]
pub struct NewCookieRecord {
    pub user_id: Uuid,
    pub domain: String,
    pub filename: String,
    pub file_path: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// One entry of a browser-exported `*.cookies.json` file.
///
/// Only `expires` is used; every field is lenient so that partially
/// well-formed exports still yield an expiry signal.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    /// Unix seconds; absent or non-positive for session cookies.
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub http_only: Option<bool>,
    #[serde(default)]
    pub secure: Option<bool>,
}

/// Result of a cookie-availability lookup for a scrape target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieCheck {
    pub has_cookies: bool,
    pub domain: String,
}

// =============================================================================
// KNOWLEDGE / CHANNEL MANAGEMENT TYPES
// =============================================================================

/// Video selected for transcription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSelection {
    pub video_id: String,
    pub title: String,
}

/// Request to add selected videos to the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeAddRequest {
    pub channel_title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel_id: String,
    pub videos: Vec<VideoSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeAddResponse {
    pub job_id: String,
    pub message: String,
    pub total_videos: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDeleteResponse {
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub videos_deleted: i64,
    #[serde(default)]
    pub vectors_deleted: i64,
    #[serde(default)]
    pub files_deleted: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    pub channel_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDeleteSuccess {
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub videos_deleted: i64,
    #[serde(default)]
    pub vectors_deleted: i64,
    #[serde(default)]
    pub files_deleted: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDeleteFailure {
    pub channel_id: String,
    #[serde(default)]
    pub channel_title: String,
    pub error: String,
}

/// Partitioned result of a bulk delete.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    #[serde(default)]
    pub succeeded: Vec<BulkDeleteSuccess>,
    #[serde(default)]
    pub failed: Vec<BulkDeleteFailure>,
    #[serde(default)]
    pub message: String,
}

/// Dependent-data count shown before a destructive action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependentCount {
    pub count: i64,
}

// =============================================================================
// ARTICLE / DOCUMENTATION TYPES
// =============================================================================

fn default_true() -> bool {
    true
}

/// Scrape or discover request for a single target URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeTargetRequest {
    pub url: String,
    #[serde(default = "default_true")]
    pub use_cookies: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleScrapeResponse {
    pub job_id: String,
    pub article_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPage {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    pub entry_url: String,
    pub scope_path: String,
    pub site_name: String,
    pub pages: Vec<DiscoveredPage>,
    pub total_count: i64,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_count: Option<i64>,
    #[serde(default)]
    pub has_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentationScrapeRequest {
    pub entry_url: String,
    pub site_name: String,
    pub scope_path: String,
    pub pages: Vec<DiscoveredPage>,
    #[serde(default = "default_true")]
    pub use_cookies: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationScrapeResponse {
    pub job_id: String,
    pub collection_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentationRetryResponse {
    pub job_id: String,
    pub collection_id: String,
    pub retry_count: i64,
    pub message: String,
}

// =============================================================================
// DEEP MEMORY TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub job_id: String,
    pub training_run_id: String,
    pub total_chunks: i64,
    pub message: String,
}

/// Body for train and proceed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRunRef {
    pub training_run_id: String,
}

/// Response to train and proceed requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainResponse {
    pub job_id: String,
    pub training_run_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunSummary {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub pair_count: i64,
    #[serde(default)]
    pub processed_chunks: i64,
    #[serde(default)]
    pub total_chunks: i64,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePair {
    pub question_text: String,
    pub chunk_preview: String,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunDetail {
    #[serde(flatten)]
    pub summary: TrainingRunSummary,
    #[serde(default)]
    pub deeplake_job_id: Option<String>,
    #[serde(default)]
    pub sample_pairs: Vec<SamplePair>,
    #[serde(default)]
    pub statistics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunList {
    pub runs: Vec<TrainingRunSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeepMemorySettings {
    pub enabled: bool,
    #[serde(default)]
    pub last_trained_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_training_run_id: Option<String>,
    #[serde(default)]
    pub can_enable: bool,
    #[serde(default)]
    pub total_chunks: i64,
    #[serde(default)]
    pub trained_chunk_count: i64,
    #[serde(default)]
    pub has_blocking_run: bool,
    #[serde(default)]
    pub blocking_run_id: Option<String>,
    #[serde(default)]
    pub blocking_run_status: Option<String>,
    #[serde(default = "default_true")]
    pub is_cloud: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    pub enabled: bool,
}

// =============================================================================
// API KEY TYPES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyCreateRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

/// Creation response; the full key is only ever returned here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyCreateResponse {
    pub id: String,
    pub key: String,
    pub key_prefix: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyItem {
    pub id: String,
    pub key_prefix: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKeyList {
    pub keys: Vec<ApiKeyItem>,
}
