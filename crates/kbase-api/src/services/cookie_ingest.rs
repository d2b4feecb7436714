//! Cookie file upload, replacement and lookup.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use kbase_core::cookies::{candidate_domains, compute_expiry, validate_upload_with_limit};
use kbase_core::defaults::{COOKIE_FILE_MAX_BYTES, MAX_COOKIES_PER_USER};
use kbase_core::{
    CookieCheck, CookieRecord, CookieRepository, Error, ExpiryPolicy, NewCookieRecord, Result,
    StorageBackend,
};

/// Stores one cookie file per (user, domain).
///
/// Uploading a file for a domain that already has one replaces it. The old
/// file and record are removed before the new ones are written, so two
/// concurrent uploads for the same domain can race; the unique index on
/// (user, domain) rejects the loser with a conflict.
pub struct CookieIngestService {
    repo: Arc<dyn CookieRepository>,
    files: Arc<dyn StorageBackend>,
    policy: ExpiryPolicy,
    max_per_user: i64,
    max_bytes: usize,
}

impl CookieIngestService {
    pub fn new(repo: Arc<dyn CookieRepository>, files: Arc<dyn StorageBackend>) -> Self {
        Self {
            repo,
            files,
            policy: ExpiryPolicy::default(),
            max_per_user: MAX_COOKIES_PER_USER,
            max_bytes: COOKIE_FILE_MAX_BYTES,
        }
    }

    pub fn with_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_per_user(mut self, max: i64) -> Self {
        self.max_per_user = max;
        self
    }

    pub fn with_max_bytes(mut self, max: usize) -> Self {
        self.max_bytes = max;
        self
    }

    pub async fn upload(&self, user_id: Uuid, filename: &str, data: &[u8]) -> Result<CookieRecord> {
        let domain = validate_upload_with_limit(filename, data.len(), self.max_bytes)?;

        let existing = self.repo.find_by_domain(user_id, &domain).await?;
        if existing.is_none() && self.repo.count_for_user(user_id).await? >= self.max_per_user {
            return Err(Error::Conflict(format!(
                "Maximum cookie files reached ({}). Delete one before uploading another.",
                self.max_per_user
            )));
        }

        let expires_at = compute_expiry(data, self.policy);

        if let Some(old) = &existing {
            self.files.delete(&old.file_path).await?;
            self.repo.delete(user_id, old.id).await?;
        }

        let file_path = format!("{}/{}", user_id, filename);
        self.files.write(&file_path, data).await?;

        let record = NewCookieRecord {
            user_id,
            domain: domain.clone(),
            filename: filename.to_string(),
            file_path: file_path.clone(),
            expires_at,
        };
        let record = match self.repo.insert(record).await {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.files.delete(&file_path).await {
                    warn!(
                        subsystem = "api",
                        component = "cookie_ingest",
                        file_path = %file_path,
                        error = %cleanup,
                        "Failed to remove orphaned cookie file"
                    );
                }
                return Err(e);
            }
        };

        info!(
            subsystem = "api",
            component = "cookie_ingest",
            op = "upload",
            user_id = %user_id,
            domain = %domain,
            replaced = existing.is_some(),
            size = data.len(),
            "Cookie file stored"
        );
        Ok(record)
    }

    /// Records for a user, newest first.
    pub async fn list(&self, user_id: Uuid) -> Result<Vec<CookieRecord>> {
        self.repo.list(user_id).await
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let record = self
            .repo
            .get(user_id, id)
            .await?
            .ok_or_else(|| Error::NotFound("Cookie not found".to_string()))?;

        self.files.delete(&record.file_path).await?;
        self.repo.delete(user_id, id).await?;

        info!(
            subsystem = "api",
            component = "cookie_ingest",
            op = "delete",
            user_id = %user_id,
            domain = %record.domain,
            "Cookie file deleted"
        );
        Ok(())
    }

    /// Whether a cookie file covers the target URL's host or a parent domain.
    ///
    /// An unparsable target reports no cookies and an empty domain.
    pub async fn has_cookies_for(&self, user_id: Uuid, target: &str) -> Result<CookieCheck> {
        let domains = match candidate_domains(target) {
            Ok(domains) => domains,
            Err(_) => {
                return Ok(CookieCheck {
                    has_cookies: false,
                    domain: String::new(),
                })
            }
        };

        match self.repo.find_first_domain(user_id, &domains).await? {
            Some(record) => Ok(CookieCheck {
                has_cookies: true,
                domain: record.domain,
            }),
            None => Ok(CookieCheck {
                has_cookies: false,
                domain: domains.into_iter().next().unwrap_or_default(),
            }),
        }
    }
}
