//! Cookie file record repository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use kbase_core::{CookieRecord, CookieRepository, Error, NewCookieRecord, Result};

const COOKIE_COLUMNS: &str = "id, user_id, domain, filename, file_path, expires_at, created_at";

/// PostgreSQL cookie record repository.
#[derive(Clone)]
pub struct PgCookieRepository {
    pool: Pool<Postgres>,
}

impl PgCookieRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(r: &sqlx::postgres::PgRow) -> CookieRecord {
        CookieRecord {
            id: r.get("id"),
            user_id: r.get("user_id"),
            domain: r.get("domain"),
            filename: r.get("filename"),
            file_path: r.get("file_path"),
            expires_at: r.get("expires_at"),
            created_at: r.get("created_at"),
        }
    }
}

#[async_trait]
impl CookieRepository for PgCookieRepository {
    async fn find_by_domain(&self, user_id: Uuid, domain: &str) -> Result<Option<CookieRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {COOKIE_COLUMNS} FROM user_cookie WHERE user_id = $1 AND domain = $2"
        ))
        .bind(user_id)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn find_first_domain(
        &self,
        user_id: Uuid,
        domains: &[String],
    ) -> Result<Option<CookieRecord>> {
        if domains.is_empty() {
            return Ok(None);
        }
        // array_position keeps the caller's most-specific-first order.
        let row = sqlx::query(&format!(
            "SELECT {COOKIE_COLUMNS} FROM user_cookie
             WHERE user_id = $1 AND domain = ANY($2)
             ORDER BY array_position($2, domain)
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(domains)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn get(&self, user_id: Uuid, id: Uuid) -> Result<Option<CookieRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {COOKIE_COLUMNS} FROM user_cookie WHERE user_id = $1 AND id = $2"
        ))
        .bind(user_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(Self::parse_row))
    }

    async fn count_for_user(&self, user_id: Uuid) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM user_cookie WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<CookieRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COOKIE_COLUMNS} FROM user_cookie
             WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(Self::parse_row).collect())
    }

    async fn insert(&self, record: NewCookieRecord) -> Result<CookieRecord> {
        let row = sqlx::query(&format!(
            "INSERT INTO user_cookie (id, user_id, domain, filename, file_path, expires_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COOKIE_COLUMNS}"
        ))
        .bind(Uuid::now_v7())
        .bind(record.user_id)
        .bind(&record.domain)
        .bind(&record.filename)
        .bind(&record.file_path)
        .bind(record.expires_at)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if duplicate {
                Error::Conflict(format!("Cookie file for {} already exists", record.domain))
            } else {
                Error::Database(e)
            }
        })?;

        Ok(Self::parse_row(&row))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_cookie WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }
}
