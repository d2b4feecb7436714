//! Route tests against in-memory stores and a mocked scrape backend.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kbase_api::{build_app, ApiConfig, AppState, Authenticator, StorageKind, Stores};
use kbase_backend::{BackendClient, BackendConfig};
use kbase_core::{Error, HostResolver, Result};

const TOKEN: &str = "test-token";
const BOUNDARY: &str = "kbase-test-boundary";

struct StaticAuth {
    user_id: Uuid,
}

#[async_trait]
impl Authenticator for StaticAuth {
    async fn authenticate(&self, token: &str) -> Result<Uuid> {
        if token == TOKEN {
            Ok(self.user_id)
        } else {
            Err(Error::Unauthorized("Invalid or expired session".to_string()))
        }
    }
}

/// Hosts under `internal.example.com` resolve to a private address;
/// everything else to a public one.
struct StaticResolver;

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> Result<Vec<IpAddr>> {
        let addr = if host.ends_with("internal.example.com") {
            "10.0.0.7"
        } else {
            "93.184.216.34"
        };
        Ok(vec![addr.parse().unwrap()])
    }
}

struct TestApp {
    router: Router,
    backend: MockServer,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_config(ApiConfig::default()).await
    }

    async fn with_config(config: ApiConfig) -> Self {
        let backend = MockServer::start().await;
        let backend_config = BackendConfig::default().with_base_url(backend.uri());
        let client = BackendClient::new(backend_config.clone()).unwrap();
        let config = config
            .with_storage(StorageKind::Memory)
            .with_backend(backend_config);
        let auth = Arc::new(StaticAuth {
            user_id: Uuid::now_v7(),
        });
        let state = AppState::new(config, Stores::memory(), client, auth)
            .with_resolver(Arc::new(StaticResolver));
        Self {
            router: build_app(state),
            backend,
        }
    }

    async fn send(&self, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let (status, bytes) = self.send(builder.body(body).unwrap()).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    async fn upload(&self, filename: &str, content: &str) -> (StatusCode, Value) {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/json\r\n\r\n{c}\r\n--{b}--\r\n",
            b = BOUNDARY,
            f = filename,
            c = content
        );
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/cookies")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        let (status, bytes) = self.send(req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn mock_channel(&self, videos: Value) {
        Mock::given(method("GET"))
            .and(path("/v1/api/youtube/preview"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "channel_title": "Foo",
                "channel_url": "https://www.youtube.com/@Foo",
                "total_videos": videos.as_array().map(|v| v.len()).unwrap_or(0),
                "categories": {},
                "videos": videos,
            })))
            .expect(1)
            .mount(&self.backend)
            .await;
    }
}

fn video(id: &str, views: i64, category: &str) -> Value {
    json!({
        "video_id": id,
        "title": format!("Video {}", id),
        "url": format!("https://youtube.com/watch?v={}", id),
        "views": views,
        "category": category,
    })
}

// =============================================================================
// HEALTH / AUTH
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_auth() {
    let app = TestApp::new().await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_missing_or_bad_token_is_401() {
    let app = TestApp::new().await;

    let req = Request::builder().uri("/api/cookies").body(Body::empty()).unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "Not authenticated");

    let req = Request::builder()
        .uri("/api/cookies")
        .header(header::AUTHORIZATION, "Bearer wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// PREVIEW
// =============================================================================

#[tokio::test]
async fn test_preview_requires_url() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/youtube/preview").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "url parameter is required");
}

#[tokio::test]
async fn test_preview_miss_then_hit() {
    let app = TestApp::new().await;
    app.mock_channel(json!([
        video("a", 10, "Stock Picks & Analysis"),
        video("b", 50, "Educational & Tutorials"),
    ]))
    .await;

    let (status, first) = app
        .get("/api/youtube/preview?url=https://www.youtube.com/@Foo/videos")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["channel_url"], "https://www.youtube.com/@Foo");
    assert_eq!(first["total_videos"], 2);
    assert_eq!(first["videos"][0]["video_id"], "b");
    assert_eq!(first["categories"]["Stock Picks & Analysis"], 1);
    assert_eq!(first["categories"]["Educational & Tutorials"], 1);

    let (status, second) = app
        .get("/api/youtube/preview?url=https://www.youtube.com/@Foo")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["channel_id"], first["channel_id"]);

    let (_, channels) = app.get("/api/channels").await;
    assert_eq!(channels["channels"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_preview_clamps_paging_and_filters() {
    let app = TestApp::new().await;
    app.mock_channel(json!([
        video("a", 10, "Stock Picks & Analysis"),
        video("b", 50, "Educational & Tutorials"),
        video("c", 30, "Stock Picks & Analysis"),
    ]))
    .await;

    let (status, page) = app
        .get("/api/youtube/preview?url=https://www.youtube.com/@Foo&page=0&pageSize=500")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["page"], 1);
    assert_eq!(page["page_size"], 100);

    let (_, filtered) = app
        .get(
            "/api/youtube/preview?url=https://www.youtube.com/@Foo\
             &category=Stock%20Picks%20%26%20Analysis&pageSize=abc",
        )
        .await;
    assert_eq!(filtered["page_size"], 20);
    assert_eq!(filtered["total_videos"], 2);
    let ids: Vec<&str> = filtered["videos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["video_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["c", "a"]);
}

#[tokio::test]
async fn test_preview_backend_error_passes_status() {
    let app = TestApp::new().await;
    Mock::given(method("GET"))
        .and(path("/v1/api/youtube/preview"))
        .respond_with(ResponseTemplate::new(503).set_body_string("scraper down"))
        .mount(&app.backend)
        .await;

    let (status, body) = app
        .get("/api/youtube/preview?url=https://www.youtube.com/@Foo")
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Backend scrape failed: scraper down");
}

// =============================================================================
// COOKIES
// =============================================================================

#[tokio::test]
async fn test_cookie_upload_replaces_same_domain() {
    let app = TestApp::new().await;

    let (status, first) = app
        .upload(
            "example.com.cookies.json",
            r#"[{"name":"sid","expires":4102444800}]"#,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cookie"]["domain"], "example.com");
    assert!(first["cookie"]["expires_at"].is_string());
    assert!(first["cookie"].get("file_path").is_none());

    let (status, second) = app.upload("www.Example.COM.cookies.json", "not json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(second["cookie"]["expires_at"].is_null());

    let (_, list) = app.get("/api/cookies").await;
    let cookies = list["cookies"].as_array().unwrap();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0]["filename"], "www.Example.COM.cookies.json");
}

#[tokio::test]
async fn test_cookie_upload_rejects_bad_filename() {
    let app = TestApp::new().await;
    let (status, body) = app.upload("cookies.txt", "[]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("cookies.json"));
}

#[tokio::test]
async fn test_cookie_quota_is_409() {
    let app = TestApp::with_config(ApiConfig::default().with_max_cookies_per_user(2)).await;
    assert_eq!(app.upload("a.com.cookies.json", "[]").await.0, StatusCode::OK);
    assert_eq!(app.upload("b.com.cookies.json", "[]").await.0, StatusCode::OK);

    let (status, body) = app.upload("c.com.cookies.json", "[]").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().starts_with("Maximum cookie files reached"));

    assert_eq!(app.upload("a.com.cookies.json", "[]").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_cookie_check_and_delete() {
    let app = TestApp::new().await;
    let (_, uploaded) = app.upload("example.com.cookies.json", "[]").await;
    let id = uploaded["cookie"]["id"].as_str().unwrap().to_string();

    let (_, check) = app
        .get("/api/cookies/check?url=https://docs.example.com/guide")
        .await;
    assert_eq!(check, json!({ "has_cookies": true, "domain": "example.com" }));

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/cookies?id={}", id), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .call(Method::DELETE, &format!("/api/cookies?id={}", id), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Cookie not found");

    let (status, _) = app.call(Method::DELETE, "/api/cookies", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// GUARDED SCRAPES
// =============================================================================

#[tokio::test]
async fn test_article_scrape_to_private_address_rejected() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/api/articles/scrape"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.backend)
        .await;

    for url in [
        "http://127.0.0.1/x",
        "http://169.254.169.254/latest/meta-data",
        "file:///etc/passwd",
        "https://wiki.internal.example.com/page",
    ] {
        let (status, _) = app
            .call(Method::POST, "/api/articles/scrape", Some(json!({ "url": url })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", url);
    }
}

#[tokio::test]
async fn test_documentation_scrape_checks_every_page() {
    let app = TestApp::new().await;
    let (status, _) = app
        .call(
            Method::POST,
            "/api/documentation/scrape",
            Some(json!({
                "entry_url": "https://docs.example.com/",
                "site_name": "Docs",
                "scope_path": "/",
                "pages": [
                    { "url": "https://docs.example.com/a", "title": "A" },
                    { "url": "http://10.0.0.5/b", "title": "B" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_article_scrape_proxied() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/api/articles/scrape"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "job_id": "job-9",
            "article_id": "art-1",
            "message": "queued",
            "queue_position": 2
        })))
        .expect(1)
        .mount(&app.backend)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/articles/scrape",
            Some(json!({ "url": "https://blog.example.com/post" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        body,
        json!({
            "job_id": "job-9",
            "article_id": "art-1",
            "message": "queued",
            "queue_position": 2
        })
    );
}

#[tokio::test]
async fn test_training_runs_relayed_unchanged() {
    let app = TestApp::new().await;
    let runs = json!({
        "runs": [{
            "id": "run-1",
            "status": "completed",
            "started_at": "2026-01-02T03:04:05Z",
            "base_model": "qwen2.5-1.5b"
        }],
        "total": 1
    });
    Mock::given(method("GET"))
        .and(path("/v1/api/deep-memory/runs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(runs.clone()))
        .expect(1)
        .mount(&app.backend)
        .await;

    let (status, body) = app.get("/api/deep-memory/runs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, runs);
}

#[tokio::test]
async fn test_article_delete() {
    let app = TestApp::new().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/articles/art-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&app.backend)
        .await;

    let (status, body) = app.call(Method::DELETE, "/api/articles/art-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article_id"], "art-1");
    assert_eq!(body["message"], "Article deleted");
}

#[tokio::test]
async fn test_article_delete_404_is_success() {
    let app = TestApp::new().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/articles/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "not found" })))
        .mount(&app.backend)
        .await;

    let (status, body) = app.call(Method::DELETE, "/api/articles/gone", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Article already deleted");
}

#[tokio::test]
async fn test_article_delete_failure_passes_status() {
    let app = TestApp::new().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/articles/art-2"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
        .mount(&app.backend)
        .await;

    let (status, body) = app.call(Method::DELETE, "/api/articles/art-2", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "db down");
}

// =============================================================================
// CHANNEL DELETES / KEYS
// =============================================================================

#[tokio::test]
async fn test_bulk_delete_partial_is_207() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .and(path("/v1/api/knowledge/channels/bulk-delete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "succeeded": [{ "channel_id": "c1" }, { "channel_id": "c2" }],
            "failed": [{ "channel_id": "c3", "error": "locked" }],
            "message": "2 of 3 deleted"
        })))
        .mount(&app.backend)
        .await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/channels/bulk-delete",
            Some(json!({ "channel_ids": ["c1", "c2", "c3"] })),
        )
        .await;
    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["failed"][0]["channel_id"], "c3");

    let (status, _) = app
        .call(
            Method::POST,
            "/api/channels/bulk-delete",
            Some(json!({ "channel_ids": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_channel_delete_404_is_success() {
    let app = TestApp::new().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/knowledge/channels/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "not found" })))
        .mount(&app.backend)
        .await;

    let (status, body) = app.call(Method::DELETE, "/api/channels/gone", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Channel already deleted");
}

#[tokio::test]
async fn test_key_revoke_passes_204() {
    let app = TestApp::new().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/keys/key-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&app.backend)
        .await;

    let (status, body) = app.call(Method::DELETE, "/api/keys?key_id=key-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, body) = app.call(Method::DELETE, "/api/keys", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "key_id required");
}

// =============================================================================
// JOB EVENT RELAY
// =============================================================================

#[tokio::test]
async fn test_event_relay_forwards_and_marks_transcribed() {
    let app = TestApp::new().await;
    app.mock_channel(json!([
        video("a", 10, "Stock Picks & Analysis"),
        video("b", 5, "Stock Picks & Analysis"),
    ]))
    .await;
    let (_, page) = app
        .get("/api/youtube/preview?url=https://www.youtube.com/@Foo")
        .await;
    assert_eq!(page["videos"][0]["is_transcribed"], false);

    let sse = concat!(
        "event: job_update\n",
        "data: {\"id\":\"job-1\",\"status\":\"in_progress\",\"progress\":50,\"total_videos\":2,\"processed_videos\":1}\n\n",
        "event: heartbeat\n",
        "data: {}\n\n",
        "event: job_update\n",
        "data: {\"id\":\"job-1\",\"status\":\"completed\",\"progress\":100,\"succeeded_videos\":[\"a\"]}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/v1/api/events/stream/job-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .mount(&app.backend)
        .await;

    let req = Request::builder()
        .uri("/api/events/stream/job-1?kind=media_add")
        .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let body = String::from_utf8(body).unwrap();
    assert_eq!(body.matches("event: job_update").count(), 2);
    assert!(!body.contains("heartbeat"));
    assert!(body.contains("\"status\":\"completed\""));

    let (_, page) = app
        .get("/api/youtube/preview?url=https://www.youtube.com/@Foo")
        .await;
    assert_eq!(page["cached"], true);
    let transcribed: Vec<(&str, bool)> = page["videos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| (v["video_id"].as_str().unwrap(), v["is_transcribed"].as_bool().unwrap()))
        .collect();
    assert_eq!(transcribed, vec![("a", true), ("b", false)]);
}

#[tokio::test]
async fn test_event_relay_requires_auth() {
    let app = TestApp::new().await;
    let req = Request::builder()
        .uri("/api/events/stream/job-1")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_relay_accepts_query_token() {
    let app = TestApp::new().await;
    let sse = concat!(
        "event: job_update\n",
        "data: {\"id\":\"job-2\",\"status\":\"failed\",\"progress\":10,\"error_message\":\"boom\"}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/v1/api/events/stream/job-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .mount(&app.backend)
        .await;

    let req = Request::builder()
        .uri(format!("/api/events/stream/job-2?kind=article_scrape&access_token={}", TOKEN))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(req).await;
    assert_eq!(status, StatusCode::OK);
    let body = String::from_utf8(body).unwrap();
    assert!(body.contains("\"status\":\"failed\""));

    let req = Request::builder()
        .uri("/api/events/stream/job-2?access_token=wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_query_token_not_accepted_elsewhere() {
    let app = TestApp::new().await;
    let req = Request::builder()
        .uri(format!("/api/channels?access_token={}", TOKEN))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
