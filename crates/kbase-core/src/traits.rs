//! Core traits for kbase abstractions.
//!
//! Storage and remote collaborators sit behind these traits so the
//! Postgres, filesystem and in-memory implementations are interchangeable
//! in the services and route tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CHANNEL CACHE REPOSITORY
// =============================================================================

/// Query for one page of a channel's stored videos.
#[derive(Debug, Clone)]
pub struct VideoPageRequest {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    /// Restrict to one category; `None` returns every row.
    pub category_id: Option<i32>,
    pub limit: i64,
    pub offset: i64,
}

/// Repository for cached channel previews and their video rows.
///
/// Every method is scoped by `user_id`.
#[async_trait]
pub trait ChannelCacheRepository: Send + Sync {
    /// Find the entry for a canonical channel URL scraped at or after `since`.
    async fn find_fresh(
        &self,
        user_id: Uuid,
        channel_url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<CachedChannel>>;

    /// Insert or update channel metadata keyed on (user, channel_url).
    ///
    /// `scraped_at` sets `last_scraped_at` when present and leaves it
    /// untouched otherwise.
    async fn upsert_channel(
        &self,
        user_id: Uuid,
        channel: NewChannel,
        scraped_at: Option<DateTime<Utc>>,
    ) -> Result<CachedChannel>;

    /// Upsert one batch of video rows keyed on (user, channel, video_id).
    async fn upsert_videos(&self, user_id: Uuid, channel_id: Uuid, videos: &[NewVideo])
        -> Result<u64>;

    /// Per-category row counts for a channel, computed from stored rows.
    async fn category_counts(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<BTreeMap<String, i64>>;

    /// Page of rows ordered by views descending, ties by video_id.
    async fn list_videos(&self, req: VideoPageRequest) -> Result<VideoPage>;

    /// All channels for a user, most recently scraped first.
    async fn list_channels(&self, user_id: Uuid) -> Result<Vec<CachedChannel>>;

    /// Number of transcribed videos under a channel.
    async fn transcribed_count(&self, user_id: Uuid, channel_id: Uuid) -> Result<i64>;

    /// Flag the given videos as transcribed. Returns rows updated.
    async fn mark_transcribed(&self, user_id: Uuid, video_ids: &[String]) -> Result<u64>;
}

// =============================================================================
// CATEGORY REPOSITORY
// =============================================================================

/// The shared category lookup table.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// All categories, ordered by id.
    async fn list_all(&self) -> Result<Vec<Category>>;

    /// Insert a category if absent and return its row.
    async fn ensure(&self, name: &str) -> Result<Category>;
}

// =============================================================================
// COOKIE REPOSITORY
// =============================================================================

/// Repository for cookie file records.
#[async_trait]
pub trait CookieRepository: Send + Sync {
    /// Record for (user, domain), if any.
    async fn find_by_domain(&self, user_id: Uuid, domain: &str) -> Result<Option<CookieRecord>>;

    /// First record whose domain is in `domains`, honoring the slice order.
    async fn find_first_domain(
        &self,
        user_id: Uuid,
        domains: &[String],
    ) -> Result<Option<CookieRecord>>;

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<CookieRecord>>;

    async fn count_for_user(&self, user_id: Uuid) -> Result<i64>;

    /// Records for a user, newest first.
    async fn list(&self, user_id: Uuid) -> Result<Vec<CookieRecord>>;

    async fn insert(&self, record: NewCookieRecord) -> Result<CookieRecord>;

    /// Delete a record. Returns false when nothing matched.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
}

// =============================================================================
// BLOB STORAGE
// =============================================================================

/// Object storage for uploaded files, addressed by relative path.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data, replacing any existing object at `path`.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete an object. Missing objects are not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;
}

// =============================================================================
// REMOTE COLLABORATORS
// =============================================================================

/// Source of full channel scrapes (the scrape backend).
#[async_trait]
pub trait ChannelScraper: Send + Sync {
    /// Scrape a whole channel. `raw_url` is forwarded as the user typed it.
    async fn scrape_channel(&self, raw_url: &str) -> Result<ChannelPreview>;
}

/// Target of single and bulk destructive actions.
#[async_trait]
pub trait DeleteTarget: Send + Sync {
    /// Count of dependent records shown in the confirmation warning.
    async fn dependent_count(&self, id: &str) -> Result<i64>;

    async fn delete_one(&self, id: &str) -> Result<()>;

    /// Delete many ids in one request, partitioned by outcome.
    async fn delete_many(&self, ids: &[String]) -> Result<BulkDeleteResponse>;
}
