//! Channel preview with a per-day scrape cache.
//!
//! A channel is scraped in full at most once per UTC day per user. Every
//! request, hit or miss, is then served from the stored rows so paging and
//! category filters behave the same either way.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use kbase_core::channel_url::{canonicalize, day_start_utc};
use kbase_core::defaults::{
    PREVIEW_PAGE_SIZE, PREVIEW_PAGE_SIZE_MAX, UNKNOWN_CATEGORY, VIDEO_UPSERT_BATCH,
};
use kbase_core::{
    CachedChannel, ChannelCacheRepository, ChannelPreview, ChannelScraper, Error, NewChannel,
    NewVideo, PreviewVideo, Result, VideoPageRequest,
};
use kbase_db::CategoryCache;

/// Clamped page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: PREVIEW_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// `page >= 1`, `1 <= page_size <= 100`; out-of-range values are clamped.
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, PREVIEW_PAGE_SIZE_MAX),
        }
    }

    /// Parse raw query values; missing or non-numeric values use defaults.
    pub fn parse(page: Option<&str>, page_size: Option<&str>) -> Self {
        let d = Self::default();
        let num = |v: Option<&str>, default: i64| {
            v.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(default)
        };
        Self::new(num(page, d.page), num(page_size, d.page_size))
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// One page of a channel preview.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelPage {
    pub channel_id: Uuid,
    #[serde(flatten)]
    pub preview: ChannelPreview,
    pub page: i64,
    pub page_size: i64,
    /// True when served without scraping.
    pub cached: bool,
}

pub struct ChannelPreviewService {
    channels: Arc<dyn ChannelCacheRepository>,
    categories: Arc<CategoryCache>,
    scraper: Arc<dyn ChannelScraper>,
}

impl ChannelPreviewService {
    pub fn new(
        channels: Arc<dyn ChannelCacheRepository>,
        categories: Arc<CategoryCache>,
        scraper: Arc<dyn ChannelScraper>,
    ) -> Self {
        Self {
            channels,
            categories,
            scraper,
        }
    }

    pub async fn get_channel_page(
        &self,
        user_id: Uuid,
        raw_url: &str,
        page: PageRequest,
        category: Option<&str>,
    ) -> Result<ChannelPage> {
        let raw_url = raw_url.trim();
        if raw_url.is_empty() {
            return Err(Error::InvalidInput("url parameter is required".to_string()));
        }

        let start = Instant::now();
        let canonical = canonicalize(raw_url);
        let now = Utc::now();

        let (channel, cached) = match self
            .channels
            .find_fresh(user_id, &canonical, day_start_utc(now))
            .await?
        {
            Some(channel) => (channel, true),
            None => (self.refresh(user_id, raw_url, &canonical, now).await?, false),
        };

        let categories = self.channels.category_counts(user_id, channel.id).await?;

        // Unknown category names fall back to the unfiltered list.
        let category_id = match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(name) => self.categories.resolve(name).await?,
            None => None,
        };

        let rows = self
            .channels
            .list_videos(VideoPageRequest {
                user_id,
                channel_id: channel.id,
                category_id,
                limit: page.page_size,
                offset: page.offset(),
            })
            .await?;

        let total_videos = if category_id.is_some() {
            rows.total
        } else {
            channel.total_videos
        };

        let cache = if cached { "hit" } else { "miss" };
        info!(
            subsystem = "api",
            component = "channel_preview",
            op = "get_channel_page",
            user_id = %user_id,
            cache,
            page = page.page,
            page_size = page.page_size,
            rows = rows.rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Channel page served"
        );

        Ok(ChannelPage {
            channel_id: channel.id,
            preview: ChannelPreview {
                channel_title: channel.channel_title,
                channel_url: channel.channel_url,
                total_videos,
                categories,
                videos: rows.rows.into_iter().map(PreviewVideo::from).collect(),
            },
            page: page.page,
            page_size: page.page_size,
            cached,
        })
    }

    /// Scrape the whole channel and persist it. `last_scraped_at` is only set
    /// once every row is stored, so a failed refresh is retried next request.
    async fn refresh(
        &self,
        user_id: Uuid,
        raw_url: &str,
        canonical: &str,
        now: DateTime<Utc>,
    ) -> Result<CachedChannel> {
        let scraped = self
            .scraper
            .scrape_channel(raw_url)
            .await
            .map_err(|e| match e {
                Error::Upstream { status, body } => Error::Upstream {
                    status,
                    body: format!("Backend scrape failed: {}", body),
                },
                other => other,
            })?;

        let meta = NewChannel {
            channel_title: scraped.channel_title.clone(),
            channel_url: canonical.to_string(),
            total_videos: scraped.total_videos,
        };
        let channel = self
            .channels
            .upsert_channel(user_id, meta.clone(), None)
            .await?;

        let rows = self.to_rows(scraped.videos).await?;
        for batch in rows.chunks(VIDEO_UPSERT_BATCH) {
            self.channels
                .upsert_videos(user_id, channel.id, batch)
                .await?;
        }

        debug!(
            subsystem = "api",
            component = "channel_preview",
            op = "refresh",
            user_id = %user_id,
            channel_id = %channel.id,
            videos = rows.len(),
            "Channel scraped and stored"
        );

        self.channels.upsert_channel(user_id, meta, Some(now)).await
    }

    /// Resolve category names, storing any the table has not seen, and drop
    /// repeated video ids (first wins).
    async fn to_rows(&self, videos: Vec<PreviewVideo>) -> Result<Vec<NewVideo>> {
        let mut seen = HashSet::with_capacity(videos.len());
        let mut rows = Vec::with_capacity(videos.len());
        for v in videos {
            if !seen.insert(v.video_id.clone()) {
                continue;
            }
            let category_id = if v.category.is_empty() || v.category == UNKNOWN_CATEGORY {
                None
            } else {
                Some(self.categories.resolve_or_insert(&v.category).await?)
            };
            rows.push(NewVideo {
                video_id: v.video_id,
                title: v.title,
                url: v.url,
                views: v.views,
                category_id,
            });
        }
        Ok(rows)
    }
}
