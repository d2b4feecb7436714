//! Channel URL canonicalization and cache freshness.

use chrono::{DateTime, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Trailing channel tab segments that all refer to the same channel.
static TAB_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(videos|shorts|streams|playlists|featured|about)/?$")
        .expect("tab suffix regex is valid")
});

/// Canonical cache key for a channel URL.
///
/// Strips one trailing tab segment (`/videos`, `/shorts`, ...) and then a
/// trailing slash from the path. Query and fragment are dropped. A string
/// that does not parse as a URL is returned unchanged.
pub fn canonicalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(_) => return trimmed.to_string(),
    };

    let path = TAB_SUFFIX.replace(parsed.path(), "");
    let path = path.strip_suffix('/').unwrap_or(&path);

    let mut out = format!("{}://", parsed.scheme());
    if let Some(host) = parsed.host_str() {
        out.push_str(host);
    }
    if let Some(port) = parsed.port() {
        out.push(':');
        out.push_str(&port.to_string());
    }
    out.push_str(path);
    out
}

/// Midnight UTC of the day containing `now`.
pub fn day_start_utc(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// True when `last_scraped_at` falls within the current UTC day.
pub fn is_fresh(last_scraped_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_scraped_at {
        Some(ts) => ts >= day_start_utc(now),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_canonicalize_strips_tab_segment() {
        assert_eq!(
            canonicalize("https://youtube.com/@Foo/videos"),
            canonicalize("https://youtube.com/@Foo")
        );
        assert_eq!(
            canonicalize("https://youtube.com/@Foo/videos"),
            "https://youtube.com/@Foo"
        );
    }

    #[test]
    fn test_canonicalize_tab_with_trailing_slash() {
        assert_eq!(
            canonicalize("https://www.youtube.com/@Foo/shorts/"),
            "https://www.youtube.com/@Foo"
        );
        assert_eq!(
            canonicalize("https://www.youtube.com/c/Bar/about"),
            "https://www.youtube.com/c/Bar"
        );
    }

    #[test]
    fn test_canonicalize_only_one_segment_removed() {
        assert_eq!(
            canonicalize("https://youtube.com/@Foo/videos/streams"),
            "https://youtube.com/@Foo/videos"
        );
    }

    #[test]
    fn test_canonicalize_trailing_slash() {
        assert_eq!(
            canonicalize("https://youtube.com/@Foo/"),
            "https://youtube.com/@Foo"
        );
    }

    #[test]
    fn test_canonicalize_drops_query() {
        assert_eq!(
            canonicalize("https://youtube.com/@Foo/videos?view=0&sort=p"),
            "https://youtube.com/@Foo"
        );
    }

    #[test]
    fn test_canonicalize_malformed_returns_raw() {
        assert_eq!(canonicalize("not a url"), "not a url");
        assert_eq!(canonicalize("@Foo/videos"), "@Foo/videos");
    }

    #[test]
    fn test_canonicalize_tab_name_inside_handle_is_kept() {
        assert_eq!(
            canonicalize("https://youtube.com/@aboutcars"),
            "https://youtube.com/@aboutcars"
        );
    }

    #[test]
    fn test_day_start_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(
            day_start_utc(now),
            Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_freshness_day_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 1).unwrap();
        let yesterday_late = Utc.with_ymd_and_hms(2026, 3, 13, 23, 59, 59).unwrap();
        let midnight = Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap();

        assert!(!is_fresh(Some(yesterday_late), now));
        assert!(is_fresh(Some(midnight), now));
        assert!(!is_fresh(None, now));
    }
}
