//! Scrape backend connection settings.

use std::time::Duration;

use kbase_core::defaults;

/// Connection timeout for backend calls, including event streams.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Configuration for the scrape backend client.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `BACKEND_URL` | `http://localhost:8000` | Base URL of the scrape backend |
/// | `BACKEND_TIMEOUT_SECS` | `300` | Whole-request timeout for non-streaming calls |
/// | `BACKEND_CONNECT_TIMEOUT_SECS` | `10` | TCP/TLS connect timeout |
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    /// Applies to request/response calls only; event streams stay open
    /// until the job finishes.
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BACKEND_URL.to_string(),
            timeout: Duration::from_secs(defaults::BACKEND_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }
}

impl BackendConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let secs = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(default))
        };

        Self {
            base_url: std::env::var("BACKEND_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| defaults::BACKEND_URL.to_string()),
            timeout: secs("BACKEND_TIMEOUT_SECS", defaults::BACKEND_TIMEOUT_SECS),
            connect_timeout: secs("BACKEND_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Absolute URL for a backend path such as `/v1/api/keys`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_builder_and_endpoint() {
        let config = BackendConfig::default()
            .with_base_url("http://scraper:9000/")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(
            config.endpoint("/v1/api/events/stream/abc"),
            "http://scraper:9000/v1/api/events/stream/abc"
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
    }
}
