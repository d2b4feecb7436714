//! Channel preview cache repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kbase_core::defaults::UNKNOWN_CATEGORY;
use kbase_core::{
    CachedChannel, ChannelCacheRepository, Error, NewChannel, NewVideo, Result, VideoPage,
    VideoPageRequest, VideoRow,
};

const CHANNEL_COLUMNS: &str =
    "id, user_id, channel_title, channel_url, total_videos, last_scraped_at, created_at";

/// PostgreSQL channel cache repository.
#[derive(Clone)]
pub struct PgChannelCacheRepository {
    pool: Pool<Postgres>,
}

impl PgChannelCacheRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_channel(r: &sqlx::postgres::PgRow) -> CachedChannel {
        CachedChannel {
            id: r.get("id"),
            user_id: r.get("user_id"),
            channel_title: r.get("channel_title"),
            channel_url: r.get("channel_url"),
            total_videos: r.get("total_videos"),
            last_scraped_at: r.get("last_scraped_at"),
            created_at: r.get("created_at"),
        }
    }

    fn parse_video(r: &sqlx::postgres::PgRow) -> VideoRow {
        VideoRow {
            video_id: r.get("video_id"),
            title: r.get("title"),
            url: r.get("url"),
            views: r.get("views"),
            category_id: r.get("category_id"),
            category: r.get("category"),
            is_transcribed: r.get("is_transcribed"),
        }
    }
}

#[async_trait]
impl ChannelCacheRepository for PgChannelCacheRepository {
    async fn find_fresh(
        &self,
        user_id: Uuid,
        channel_url: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<CachedChannel>> {
        let row = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channel
             WHERE user_id = $1 AND channel_url = $2 AND last_scraped_at >= $3"
        ))
        .bind(user_id)
        .bind(channel_url)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_channel))
    }

    async fn upsert_channel(
        &self,
        user_id: Uuid,
        channel: NewChannel,
        scraped_at: Option<DateTime<Utc>>,
    ) -> Result<CachedChannel> {
        let now = Utc::now();
        let row = sqlx::query(&format!(
            "INSERT INTO channel (id, user_id, channel_title, channel_url, total_videos,
                                  last_scraped_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             ON CONFLICT (user_id, channel_url) DO UPDATE SET
                 channel_title = EXCLUDED.channel_title,
                 total_videos = EXCLUDED.total_videos,
                 last_scraped_at = COALESCE(EXCLUDED.last_scraped_at, channel.last_scraped_at),
                 updated_at = EXCLUDED.updated_at
             RETURNING {CHANNEL_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(user_id)
        .bind(&channel.channel_title)
        .bind(&channel.channel_url)
        .bind(channel.total_videos)
        .bind(scraped_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Self::parse_channel(&row))
    }

    async fn upsert_videos(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
        videos: &[NewVideo],
    ) -> Result<u64> {
        if videos.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = videos.iter().map(|_| Uuid::now_v7()).collect();
        let video_ids: Vec<&str> = videos.iter().map(|v| v.video_id.as_str()).collect();
        let titles: Vec<&str> = videos.iter().map(|v| v.title.as_str()).collect();
        let urls: Vec<&str> = videos.iter().map(|v| v.url.as_str()).collect();
        let views: Vec<i64> = videos.iter().map(|v| v.views).collect();
        let categories: Vec<Option<i32>> = videos.iter().map(|v| v.category_id).collect();

        // Upserts never reset is_transcribed.
        let result = sqlx::query(
            "INSERT INTO video (id, channel_id, user_id, video_id, title, url, views,
                                category_id, created_at, updated_at)
             SELECT u.id, $1, $2, u.video_id, u.title, u.url, u.views, u.category_id, NOW(), NOW()
             FROM UNNEST($3::uuid[], $4::text[], $5::text[], $6::text[], $7::int8[], $8::int4[])
                  AS u(id, video_id, title, url, views, category_id)
             ON CONFLICT (user_id, channel_id, video_id) DO UPDATE SET
                 title = EXCLUDED.title,
                 url = EXCLUDED.url,
                 views = EXCLUDED.views,
                 category_id = EXCLUDED.category_id,
                 updated_at = NOW()",
        )
        .bind(channel_id)
        .bind(user_id)
        .bind(&ids)
        .bind(&video_ids)
        .bind(&titles)
        .bind(&urls)
        .bind(&views)
        .bind(&categories)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn category_counts(
        &self,
        user_id: Uuid,
        channel_id: Uuid,
    ) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query(
            "SELECT COALESCE(c.name, $3) AS name, COUNT(*) AS n
             FROM video v
             LEFT JOIN category c ON c.id = v.category_id
             WHERE v.user_id = $1 AND v.channel_id = $2
             GROUP BY 1",
        )
        .bind(user_id)
        .bind(channel_id)
        .bind(UNKNOWN_CATEGORY)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|r| (r.get::<String, _>("name"), r.get::<i64, _>("n")))
            .collect())
    }

    async fn list_videos(&self, req: VideoPageRequest) -> Result<VideoPage> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM video
             WHERE user_id = $1 AND channel_id = $2
               AND ($3::int4 IS NULL OR category_id = $3)",
        )
        .bind(req.user_id)
        .bind(req.channel_id)
        .bind(req.category_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let rows = sqlx::query(
            "SELECT v.video_id, v.title, v.url, v.views, v.category_id,
                    c.name AS category, v.is_transcribed
             FROM video v
             LEFT JOIN category c ON c.id = v.category_id
             WHERE v.user_id = $1 AND v.channel_id = $2
               AND ($3::int4 IS NULL OR v.category_id = $3)
             ORDER BY v.views DESC, v.video_id ASC
             LIMIT $4 OFFSET $5",
        )
        .bind(req.user_id)
        .bind(req.channel_id)
        .bind(req.category_id)
        .bind(req.limit)
        .bind(req.offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(VideoPage {
            rows: rows.iter().map(Self::parse_video).collect(),
            total,
        })
    }

    async fn list_channels(&self, user_id: Uuid) -> Result<Vec<CachedChannel>> {
        let rows = sqlx::query(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channel
             WHERE user_id = $1
             ORDER BY last_scraped_at DESC NULLS LAST, created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_channel).collect())
    }

    async fn transcribed_count(&self, user_id: Uuid, channel_id: Uuid) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM video
             WHERE user_id = $1 AND channel_id = $2 AND is_transcribed",
        )
        .bind(user_id)
        .bind(channel_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)
    }

    async fn mark_transcribed(&self, user_id: Uuid, video_ids: &[String]) -> Result<u64> {
        if video_ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE video SET is_transcribed = TRUE, updated_at = NOW()
             WHERE user_id = $1 AND video_id = ANY($2) AND NOT is_transcribed",
        )
        .bind(user_id)
        .bind(video_ids)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }
}
