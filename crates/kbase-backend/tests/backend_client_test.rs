//! Scrape backend client tests against a mock server.

use futures::StreamExt;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kbase_backend::{BackendClient, BackendConfig, Caller, SseDecoder};
use kbase_core::{ChannelScraper, Error, KnowledgeAddRequest, ScrapeTargetRequest, VideoSelection};

fn client_for(server: &MockServer) -> BackendClient {
    BackendClient::new(BackendConfig::default().with_base_url(server.uri()))
        .expect("Failed to create client")
}

fn caller() -> Caller {
    Caller::new(Uuid::parse_str("0190c1d2-0000-7000-8000-000000000001").unwrap())
        .with_token("session-token")
}

#[tokio::test]
async fn test_scrape_channel_forwards_raw_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/api/youtube/preview"))
        .and(query_param("url", "https://youtube.com/@Foo/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "channel_title": "Foo",
            "channel_url": "https://youtube.com/@Foo/videos",
            "total_videos": 1,
            "categories": {"Music": 1},
            "videos": [{
                "video_id": "v1", "title": "Song", "url": "https://youtube.com/watch?v=v1",
                "views": 10, "category": "Music", "is_transcribed": false
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let preview = client_for(&server)
        .scrape_channel("https://youtube.com/@Foo/videos")
        .await
        .unwrap();
    assert_eq!(preview.channel_title, "Foo");
    assert_eq!(preview.videos.len(), 1);
    assert_eq!(preview.categories.get("Music"), Some(&1));
}

#[tokio::test]
async fn test_non_success_maps_to_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/api/youtube/preview"))
        .respond_with(ResponseTemplate::new(503).set_body_string("scraper overloaded"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .scrape_channel("https://youtube.com/@Foo")
        .await
        .unwrap_err();
    match err {
        Error::Upstream { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "scraper overloaded");
        }
        other => panic!("expected Upstream, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_request_error() {
    let client = BackendClient::new(BackendConfig::default().with_base_url("http://127.0.0.1:1"))
        .unwrap();
    let err = client.scrape_channel("https://youtube.com/@Foo").await.unwrap_err();
    assert!(matches!(err, Error::Request(_)));
}

#[tokio::test]
async fn test_add_videos_injects_user_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/api/knowledge/youtube/add"))
        .and(header("Authorization", "Bearer session-token"))
        .and(body_partial_json(json!({
            "channel_title": "Foo",
            "user_id": "0190c1d2-0000-7000-8000-000000000001"
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "job_id": "job-1", "message": "Queued", "total_videos": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .add_videos(
            &caller(),
            KnowledgeAddRequest {
                channel_title: "Foo".into(),
                channel_id: String::new(),
                videos: vec![
                    VideoSelection {
                        video_id: "a".into(),
                        title: "A".into(),
                    },
                    VideoSelection {
                        video_id: "b".into(),
                        title: "B".into(),
                    },
                ],
                user_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(resp.status, 202);
    assert_eq!(resp.body.job_id, "job-1");
}

#[tokio::test]
async fn test_delete_channel_encodes_id_and_user_query() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/knowledge/channels/ch%201"))
        .and(query_param("user_id", "0190c1d2-0000-7000-8000-000000000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "channel_id": "ch 1", "channel_title": "Foo", "videos_deleted": 3,
            "vectors_deleted": 30, "files_deleted": 3, "message": "Deleted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .delete_channel(&caller(), "ch 1")
        .await
        .unwrap();
    assert_eq!(resp.body.videos_deleted, 3);
}

#[tokio::test]
async fn test_revoke_api_key_no_content() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/keys/key-9"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .revoke_api_key(&caller(), "key-9")
        .await
        .unwrap();
    assert_eq!(resp.status, 204);
}

#[tokio::test]
async fn test_article_scrape_posts_use_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/api/articles/scrape"))
        .and(body_partial_json(json!({
            "url": "https://medium.com/p/1",
            "use_cookies": false
        })))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({
            "job_id": "j", "article_id": "a", "message": "Scraping started",
            "queue_position": 3
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .scrape_article(
            &caller(),
            ScrapeTargetRequest {
                url: "https://medium.com/p/1".into(),
                use_cookies: false,
                user_id: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(resp.body.article_id, "a");
    assert_eq!(resp.raw["queue_position"], 3);
}

#[tokio::test]
async fn test_delete_article_scoped_to_user() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/api/articles/art-7"))
        .and(query_param("user_id", "0190c1d2-0000-7000-8000-000000000001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Article deleted"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let resp = client_for(&server)
        .delete_article(&caller(), "art-7")
        .await
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.raw["message"], "Article deleted");
}

#[tokio::test]
async fn test_job_stream_sends_last_event_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/api/events/stream/job-1"))
        .and(header("Last-Event-ID", "4"))
        .and(header("Accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(
                    "event: job_update\nid: 5\ndata: {\"id\":\"job-1\",\"status\":\"completed\"}\n\n",
                ),
        )
        .expect(1)
        .mount(&server)
        .await;

    let response = client_for(&server)
        .open_job_stream("job-1", Some("4"))
        .await
        .unwrap();

    let mut decoder = SseDecoder::new();
    let mut frames = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        frames.extend(decoder.push(&chunk.unwrap()));
    }
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].event, "job_update");
    assert_eq!(decoder.last_event_id(), Some("5"));
}

#[tokio::test]
async fn test_job_stream_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/api/events/stream/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such job"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .open_job_stream("missing", None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
