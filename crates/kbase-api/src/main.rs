//! kbase-api server binary.

use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kbase_api::{build_app, ApiConfig, AppState, RemoteAuthenticator, StorageKind, Stores};
use kbase_backend::BackendClient;
use kbase_db::{Database, FilesystemBackend, PoolConfig};

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rotated file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "kbase_api=debug,tower_http=debug")
fn init_tracing() -> Option<WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "kbase_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("kbase-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

async fn open_stores(config: &ApiConfig) -> anyhow::Result<Stores> {
    match config.storage {
        StorageKind::Memory => {
            info!(subsystem = "api", storage = "memory", "Using in-memory storage; data is not persisted");
            Ok(Stores::memory())
        }
        StorageKind::Postgres => {
            let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env()).await?;
            db.migrate().await?;
            info!(subsystem = "api", storage = "postgres", "Database connected and migrated");

            let files = FilesystemBackend::new(&config.cookie_storage_path);
            files.validate().await?;
            info!(
                subsystem = "api",
                path = %config.cookie_storage_path.display(),
                "Cookie storage validated"
            );
            Ok(Stores::postgres(&db, files))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let config = ApiConfig::from_env()?;
    let stores = open_stores(&config).await?;
    let backend = BackendClient::new(config.backend.clone())?;
    let auth = Arc::new(RemoteAuthenticator::new(
        config.auth_url.clone(),
        config.auth_api_key.clone(),
    )?);

    let addr = config.bind_addr();
    let app = build_app(AppState::new(config, stores, backend, auth));

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
