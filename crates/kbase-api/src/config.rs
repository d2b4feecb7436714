//! Server configuration loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;

use kbase_backend::BackendConfig;
use kbase_core::{defaults, Error, ExpiryPolicy, Result};

/// Where channel cache and cookie data live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Postgres repositories plus filesystem cookie storage.
    #[default]
    Postgres,
    /// Process-local repositories; data is lost on restart.
    Memory,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageKind::Postgres),
            "memory" => Ok(StorageKind::Memory),
            other => Err(Error::Config(format!(
                "unknown STORAGE_BACKEND '{}', expected postgres or memory",
                other
            ))),
        }
    }
}

/// Configuration for the API server.
///
/// # Environment Variables
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `HOST` | `0.0.0.0` | Bind address |
/// | `PORT` | `3000` | Bind port |
/// | `DATABASE_URL` | `postgres://localhost/kbase` | Postgres connection string |
/// | `STORAGE_BACKEND` | `postgres` | `postgres` or `memory` |
/// | `AUTH_URL` | `http://localhost:54321` | Auth provider base URL |
/// | `AUTH_API_KEY` | unset | Key sent to the auth provider as `apikey` |
/// | `COOKIE_STORAGE_PATH` | `./data/cookie-files` | Cookie file directory |
/// | `COOKIE_EXPIRY_POLICY` | `earliest` | `earliest` or `latest` |
/// | `MAX_COOKIES_PER_USER` | `50` | Cookie file quota |
/// | `ALLOWED_ORIGINS` | `http://localhost:3000` | Comma-separated CORS origins |
/// | `MAX_BODY_BYTES` | `2097152` | Request body limit |
///
/// Scrape backend settings come from [`BackendConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageKind,
    pub auth_url: String,
    pub auth_api_key: Option<String>,
    pub cookie_storage_path: PathBuf,
    pub cookie_expiry_policy: ExpiryPolicy,
    pub max_cookies_per_user: i64,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub backend: BackendConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "postgres://localhost/kbase".to_string(),
            storage: StorageKind::Postgres,
            auth_url: "http://localhost:54321".to_string(),
            auth_api_key: None,
            cookie_storage_path: PathBuf::from(defaults::COOKIE_STORAGE_PATH),
            cookie_expiry_policy: ExpiryPolicy::Earliest,
            max_cookies_per_user: defaults::MAX_COOKIES_PER_USER,
            allowed_origins: vec!["http://localhost:3000".to_string()],
            max_body_bytes: defaults::MAX_BODY_BYTES,
            backend: BackendConfig::default(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    var(key).and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Numeric values that fail to parse fall back to their defaults; an
    /// unknown storage backend or expiry policy is an error.
    pub fn from_env() -> Result<Self> {
        let d = Self::default();

        let storage = match var("STORAGE_BACKEND") {
            Some(v) => v.parse()?,
            None => d.storage,
        };
        let cookie_expiry_policy = match var("COOKIE_EXPIRY_POLICY") {
            Some(v) => v.parse()?,
            None => d.cookie_expiry_policy,
        };
        let allowed_origins = match var("ALLOWED_ORIGINS") {
            Some(v) => parse_origins(&v),
            None => d.allowed_origins,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(d.host),
            port: parsed("PORT", d.port),
            database_url: var("DATABASE_URL").unwrap_or(d.database_url),
            storage,
            auth_url: var("AUTH_URL").unwrap_or(d.auth_url),
            auth_api_key: var("AUTH_API_KEY"),
            cookie_storage_path: var("COOKIE_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or(d.cookie_storage_path),
            cookie_expiry_policy,
            max_cookies_per_user: parsed("MAX_COOKIES_PER_USER", d.max_cookies_per_user),
            allowed_origins,
            max_body_bytes: parsed("MAX_BODY_BYTES", d.max_body_bytes),
            backend: BackendConfig::from_env(),
        })
    }

    pub fn with_storage(mut self, storage: StorageKind) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }

    pub fn with_cookie_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.cookie_expiry_policy = policy;
        self
    }

    pub fn with_max_cookies_per_user(mut self, max: i64) -> Self {
        self.max_cookies_per_user = max;
        self
    }

    pub fn with_allowed_origins(mut self, origins: Vec<String>) -> Self {
        self.allowed_origins = origins;
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.storage, StorageKind::Postgres);
        assert_eq!(config.cookie_expiry_policy, ExpiryPolicy::Earliest);
        assert_eq!(config.max_cookies_per_user, 50);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_storage_kind_from_str() {
        assert_eq!("memory".parse::<StorageKind>().unwrap(), StorageKind::Memory);
        assert_eq!(" Postgres ".parse::<StorageKind>().unwrap(), StorageKind::Postgres);
        assert!(matches!("sqlite".parse::<StorageKind>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("https://kb.example.com, ,http://localhost:3000,"),
            vec!["https://kb.example.com", "http://localhost:3000"]
        );
        assert!(parse_origins("  ").is_empty());
    }

    #[test]
    fn test_builders() {
        let config = ApiConfig::default()
            .with_storage(StorageKind::Memory)
            .with_max_cookies_per_user(2)
            .with_cookie_expiry_policy(ExpiryPolicy::Latest);
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.max_cookies_per_user, 2);
        assert_eq!(config.cookie_expiry_policy, ExpiryPolicy::Latest);
    }
}
