//! In-memory repositories and blob store.
//!
//! Same contracts as the Postgres and filesystem implementations, held in
//! process memory. Used by route tests and by `STORAGE_BACKEND=memory`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use kbase_core::defaults::UNKNOWN_CATEGORY;
use kbase_core::{
    CachedChannel, Category, CategoryRepository, ChannelCacheRepository, CookieRecord,
    CookieRepository, Error, NewChannel, NewCookieRecord, NewVideo, Result, StorageBackend,
    VideoPage, VideoPageRequest, VideoRow,
};

// =============================================================================
// CHANNEL CACHE
// =============================================================================

#[derive(Debug, Clone)]
struct StoredVideo {
    channel_id: Uuid,
    user_id: Uuid,
    video_id: String,
    title: String,
    url: String,
    views: i64,
    category_id: Option<i32>,
    is_transcribed: bool,
}

#[derive(Default)]
struct ChannelState {
    channels: Vec<CachedChannel>,
    videos: Vec<StoredVideo>,
}

/// In-memory channel cache. Category names are resolved through the
/// category repository it was built with.
#[derive(Clone)]
pub struct MemoryChannelCache {
    state: Arc<RwLock<ChannelState>>,
    categories: MemoryCategories,
}

impl MemoryChannelCache {
    pub fn new(categories: MemoryCategories) -> Self {
        Self {
            state: Arc::new(RwLock::new(ChannelState::default())),
            categories,
        }
    }

    /// Overwrite `last_scraped_at` for a channel (test helper for ageing entries).
    pub async fn set_last_scraped(&self, channel_id: Uuid, ts: Option<DateTime<Utc>>) {
        let mut state = self.state.write().await;
        if let Some(c) = state.channels.iter_mut().find(|c| c.id == channel_id) {
            c.last_scraped_at = ts;
        }
    }

    pub async fn video_count(&self) -> usize {
        self.state.read().await.videos.len()
    }

    async fn category_names(&self) -> HashMap<i32, String> {
        self.categories
            .rows
            .read()
            .await
            .iter()
            .map(|c| (c.id, c.name.clone()))
            .collect()
    }
}

#[async_trait]
impl ChannelCacheRepository for MemoryChannelCache {
    async fn find_fresh(
        &self,
        user_id: Uuid,
        channel_url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<CachedChannel>> {
        let state = self.state.read().await;
        Ok(state
            .channels
            .iter()
            .find(|c| {
                c.user_id == user_id
                    && c.channel_url == channel_url
                    && c.last_scraped_at.is_some_and(|ts| ts >= since)
            })
            .cloned())
    }

    async fn upsert_channel(
        &self,
        user_id: Uuid,
        channel: NewChannel,
        scraped_at: Option<DateTime<Utc>>,
    ) -> Result<CachedChannel> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .channels
            .iter_mut()
            .find(|c| c.user_id == user_id && c.channel_url == channel.channel_url)
        {
            existing.channel_title = channel.channel_title;
            existing.total_videos = channel.total_videos;
            if scraped_at.is_some() {
                existing.last_scraped_at = scraped_at;
            }
            return Ok(existing.clone());
        }

        let row = CachedChannel {
            id: Uuid::now_v7(),
            user_id,
            channel_title: channel.channel_title,
            channel_url: channel.channel_url,
            total_videos: channel.total_videos,
            last_scraped_at: scraped_at,
            created_at: Utc::now(),
        };
        state.channels.push(row.clone());
        Ok(row)
    }

    async fn upsert_videos(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
        videos: &[NewVideo],
    ) -> Result<u64> {
        let mut state = self.state.write().await;
        for v in videos {
            if let Some(existing) = state.videos.iter_mut().find(|s| {
                s.user_id == user_id && s.channel_id == channel_id && s.video_id == v.video_id
            }) {
                existing.title = v.title.clone();
                existing.url = v.url.clone();
                existing.views = v.views;
                existing.category_id = v.category_id;
            } else {
                state.videos.push(StoredVideo {
                    channel_id,
                    user_id,
                    video_id: v.video_id.clone(),
                    title: v.title.clone(),
                    url: v.url.clone(),
                    views: v.views,
                    category_id: v.category_id,
                    is_transcribed: false,
                });
            }
        }
        Ok(videos.len() as u64)
    }

    async fn category_counts(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<BTreeMap<String, i64>> {
        let names = self.category_names().await;
        let state = self.state.read().await;
        let mut counts = BTreeMap::new();
        for v in state
            .videos
            .iter()
            .filter(|v| v.user_id == user_id && v.channel_id == channel_id)
        {
            let name = v
                .category_id
                .and_then(|id| names.get(&id).cloned())
                .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
            *counts.entry(name).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn list_videos(&self, req: VideoPageRequest) -> Result<VideoPage> {
        let names = self.category_names().await;
        let state = self.state.read().await;
        let mut matching: Vec<&StoredVideo> = state
            .videos
            .iter()
            .filter(|v| v.user_id == req.user_id && v.channel_id == req.channel_id)
            .filter(|v| req.category_id.is_none() || v.category_id == req.category_id)
            .collect();
        matching.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.video_id.cmp(&b.video_id)));

        let total = matching.len() as i64;
        let rows = matching
            .into_iter()
            .skip(req.offset.max(0) as usize)
            .take(req.limit.max(0) as usize)
            .map(|v| VideoRow {
                video_id: v.video_id.clone(),
                title: v.title.clone(),
                url: v.url.clone(),
                views: v.views,
                category_id: v.category_id,
                category: v.category_id.and_then(|id| names.get(&id).cloned()),
                is_transcribed: v.is_transcribed,
            })
            .collect();

        Ok(VideoPage { rows, total })
    }

    async fn list_channels(&self, user_id: Uuid) -> Result<Vec<CachedChannel>> {
        let state = self.state.read().await;
        let mut rows: Vec<CachedChannel> = state
            .channels
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        // None sorts last
        rows.sort_by(|a, b| b.last_scraped_at.cmp(&a.last_scraped_at));
        Ok(rows)
    }

    async fn transcribed_count(&self, user_id: Uuid, channel_id: Uuid) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .videos
            .iter()
            .filter(|v| v.user_id == user_id && v.channel_id == channel_id && v.is_transcribed)
            .count() as i64)
    }

    async fn mark_transcribed(&self, user_id: Uuid, video_ids: &[String]) -> Result<u64> {
        let mut state = self.state.write().await;
        let mut updated = 0;
        for v in state
            .videos
            .iter_mut()
            .filter(|v| v.user_id == user_id && !v.is_transcribed)
        {
            if video_ids.contains(&v.video_id) {
                v.is_transcribed = true;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

// =============================================================================
// CATEGORIES
// =============================================================================

/// Category names seeded by the initial migration, in id order.
pub const SEED_CATEGORIES: &[&str] = &[
    "Educational & Tutorials",
    "Congress & Insider Moves",
    "Market News & Alerts",
    "Stock Picks & Analysis",
    "Market Commentary & Macro",
];

/// In-memory category table.
#[derive(Clone, Default)]
pub struct MemoryCategories {
    rows: Arc<RwLock<Vec<Category>>>,
}

impl MemoryCategories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the given names, ids assigned from 1.
    pub fn with_names(names: &[&str]) -> Self {
        let rows = names
            .iter()
            .enumerate()
            .map(|(i, name)| Category {
                id: i as i32 + 1,
                name: name.to_string(),
            })
            .collect();
        Self {
            rows: Arc::new(RwLock::new(rows)),
        }
    }

    /// Table matching a freshly migrated database.
    pub fn seeded() -> Self {
        Self::with_names(SEED_CATEGORIES)
    }
}

#[async_trait]
impl CategoryRepository for MemoryCategories {
    async fn list_all(&self) -> Result<Vec<Category>> {
        Ok(self.rows.read().await.clone())
    }

    async fn ensure(&self, name: &str) -> Result<Category> {
        let mut rows = self.rows.write().await;
        if let Some(existing) = rows.iter().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        let category = Category {
            id: rows.iter().map(|c| c.id).max().unwrap_or(0) + 1,
            name: name.to_string(),
        };
        rows.push(category.clone());
        Ok(category)
    }
}

// =============================================================================
// COOKIES
// =============================================================================

/// In-memory cookie record table.
#[derive(Clone, Default)]
pub struct MemoryCookies {
    rows: Arc<RwLock<Vec<CookieRecord>>>,
}

impl MemoryCookies {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CookieRepository for MemoryCookies {
    async fn find_by_domain(&self, user_id: Uuid, domain: &str) -> Result<Option<CookieRecord>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| r.user_id == user_id && r.domain == domain)
            .cloned())
    }

    async fn find_first_domain(
        &self,
        user_id: Uuid,
        domains: &[String],
    ) -> Result<Option<CookieRecord>> {
        let rows = self.rows.read().await;
        Ok(domains.iter().find_map(|d| {
            rows.iter()
                .find(|r| r.user_id == user_id && &r.domain == d)
                .cloned()
        }))
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<CookieRecord>> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|r| r.user_id == user_id && r.id == id)
            .cloned())
    }

    async fn count_for_user(&self, user_id: Uuid) -> Result<i64> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .count() as i64)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<CookieRecord>> {
        let mut rows: Vec<CookieRecord> = self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn insert(&self, record: NewCookieRecord) -> Result<CookieRecord> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|r| r.user_id == record.user_id && r.domain == record.domain)
        {
            return Err(Error::Conflict(format!(
                "Cookie file for {} already exists",
                record.domain
            )));
        }
        let row = CookieRecord {
            id: Uuid::now_v7(),
            user_id: record.user_id,
            domain: record.domain,
            filename: record.filename,
            file_path: record.file_path,
            expires_at: record.expires_at,
            created_at: Utc::now(),
        };
        rows.push(row.clone());
        Ok(row)
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|r| !(r.user_id == user_id && r.id == id));
        Ok(rows.len() < before)
    }
}

// =============================================================================
// BLOB STORE
// =============================================================================

/// In-memory blob store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored paths, sorted.
    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob {}", path)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.blobs.write().await.remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(path))
    }
}
