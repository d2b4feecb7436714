//! Centralized default constants for kbase.
//!
//! Shared default values live here so that the db, jobs and api crates agree
//! on limits without redefining their own magic numbers.

// =============================================================================
// CHANNEL PREVIEW
// =============================================================================

/// Default preview page size when `pageSize` is absent or unparseable.
pub const PREVIEW_PAGE_SIZE: i64 = 20;

/// Upper bound for preview page size; larger requests are clamped.
pub const PREVIEW_PAGE_SIZE_MAX: i64 = 100;

/// Rows per upsert statement when persisting a scraped channel.
pub const VIDEO_UPSERT_BATCH: usize = 500;

/// Category label used for rows whose category is unknown.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

// =============================================================================
// COOKIE FILES
// =============================================================================

/// Maximum accepted cookie file size (1 MiB).
pub const COOKIE_FILE_MAX_BYTES: usize = 1024 * 1024;

/// Maximum cookie records per user.
pub const MAX_COOKIES_PER_USER: i64 = 50;

/// Default base directory for stored cookie files.
pub const COOKIE_STORAGE_PATH: &str = "./data/cookie-files";

// =============================================================================
// JOB STREAMS
// =============================================================================

/// Reconnect delay after a transport error, until the server sends `retry:`.
pub const STREAM_RETRY_MS: u64 = 3_000;

/// Keepalive interval for relayed SSE streams.
pub const STREAM_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// HTTP
// =============================================================================

/// Default scrape backend base URL.
pub const BACKEND_URL: &str = "http://localhost:8000";

/// Default timeout for non-streaming backend calls.
pub const BACKEND_TIMEOUT_SECS: u64 = 300;

/// Default request body limit (slightly above the cookie file cap so the
/// size check produces a readable error instead of a bare 413).
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
