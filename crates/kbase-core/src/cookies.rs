//! Cookie file validation and parsing.
//!
//! Browser extensions export cookies as `<domain>.cookies.json`, a JSON array
//! of cookie entries. The domain comes from the filename; the file body is
//! read only to derive an expiry signal.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::defaults::COOKIE_FILE_MAX_BYTES;
use crate::error::{Error, Result};
use crate::models::CookieEntry;

static COOKIE_FILENAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(.+)\.cookies\.json$").expect("cookie filename regex is valid"));

/// Lowercase a domain and strip one leading `www.`.
pub fn normalize_domain(domain: &str) -> String {
    let lower = domain.trim().to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Normalized domain encoded in a cookie filename, if it matches the pattern.
pub fn domain_from_filename(filename: &str) -> Option<String> {
    let caps = COOKIE_FILENAME.captures(filename)?;
    let domain = normalize_domain(caps.get(1)?.as_str());
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

/// Validate an upload and return the normalized domain.
///
/// Checks run in order and stop at the first failure: size, filename
/// pattern, path separators, non-empty domain.
pub fn validate_upload(filename: &str, size: usize) -> Result<String> {
    validate_upload_with_limit(filename, size, COOKIE_FILE_MAX_BYTES)
}

/// [`validate_upload`] with an explicit size limit.
pub fn validate_upload_with_limit(filename: &str, size: usize, max_bytes: usize) -> Result<String> {
    if size > max_bytes {
        return Err(Error::InvalidInput(format!(
            "File too large ({} bytes, max {} bytes)",
            size, max_bytes
        )));
    }
    if !COOKIE_FILENAME.is_match(filename) {
        return Err(Error::InvalidInput(
            "Filename must match <domain>.cookies.json".to_string(),
        ));
    }
    if filename.contains('/') || filename.contains('\\') {
        return Err(Error::InvalidInput(
            "Filename must not contain path separators".to_string(),
        ));
    }
    domain_from_filename(filename)
        .ok_or_else(|| Error::InvalidInput("Could not extract domain from filename".to_string()))
}

// =============================================================================
// EXPIRY
// =============================================================================

/// Which cookie expiry represents the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// The file is stale once any cookie expires.
    #[default]
    Earliest,
    /// The file is stale once every cookie has expired.
    Latest,
}

impl FromStr for ExpiryPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "earliest" => Ok(ExpiryPolicy::Earliest),
            "latest" => Ok(ExpiryPolicy::Latest),
            other => Err(Error::Config(format!(
                "unknown cookie expiry policy '{}', expected earliest or latest",
                other
            ))),
        }
    }
}

/// Derive the expiry signal from a cookie file body.
///
/// Returns `None` when the body is not a JSON array of cookie entries or
/// when no entry has a positive `expires`.
pub fn compute_expiry(content: &[u8], policy: ExpiryPolicy) -> Option<DateTime<Utc>> {
    let entries: Vec<CookieEntry> = match serde_json::from_slice(content) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(error = %e, "Cookie file is not a JSON cookie array, no expiry");
            return None;
        }
    };

    let expiries = entries
        .iter()
        .filter_map(|c| c.expires)
        .filter(|e| e.is_finite() && *e > 0.0);

    let pick = match policy {
        ExpiryPolicy::Earliest => expiries.fold(None, |acc: Option<f64>, e| {
            Some(acc.map_or(e, |a| a.min(e)))
        }),
        ExpiryPolicy::Latest => expiries.fold(None, |acc: Option<f64>, e| {
            Some(acc.map_or(e, |a| a.max(e)))
        }),
    }?;

    Utc.timestamp_opt(pick.trunc() as i64, 0).single()
}

// =============================================================================
// LOOKUP
// =============================================================================

/// Domains to look up for a scrape target, most specific first.
///
/// The host is normalized, then parent domains are appended down to two
/// labels: `docs.api.example.com` yields `docs.api.example.com`,
/// `api.example.com`, `example.com`.
pub fn candidate_domains(target: &str) -> Result<Vec<String>> {
    let parsed =
        Url::parse(target).map_err(|e| Error::InvalidInput(format!("Invalid URL: {}", e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidInput("URL has no host".to_string()))?;
    let host = normalize_domain(host);

    let labels: Vec<&str> = host.split('.').collect();
    let mut out = vec![host.clone()];
    for start in 1..labels.len().saturating_sub(1) {
        out.push(labels[start..].join("."));
    }
    Ok(out)
}
