//! End-to-end router tests against a stubbed Moltbook API.
//!
//! The stub is a real axum server on an ephemeral port answering from a
//! canned (method, path) -> JSON table and recording every hit, so tests can
//! assert both the rendered HTML and which remote endpoints were touched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use url::Url;

use moltchat::config::RemoteSettings;
use moltchat::infra::api::MoltbookClient;
use moltchat::infra::assets::AssetDir;
use moltchat::infra::db::Store;
use moltchat::infra::http::{HttpState, build_router};

#[derive(Clone, Default)]
struct Stub {
    responses: Arc<HashMap<String, Value>>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl Stub {
    fn new(responses: Vec<(&str, Value)>) -> Self {
        Self {
            responses: Arc::new(
                responses
                    .into_iter()
                    .map(|(key, value)| (key.to_string(), value))
                    .collect(),
            ),
            hits: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

async fn stub_handler(State(stub): State<Stub>, request: Request) -> Response {
    let key = format!("{} {}", request.method(), request.uri().path());
    stub.hits.lock().unwrap().push(key.clone());
    match stub.responses.get(&key) {
        Some(value) => Json(value.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, "stub: no canned response").into_response(),
    }
}

async fn spawn_stub(stub: Stub) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub addr");
    let router = Router::new().fallback(stub_handler).with_state(stub);
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .expect("stub server");
    });
    format!("http://{addr}/api/v1")
}

struct TestApp {
    router: Router,
    store: Store,
    // Keeps the asset directory alive for the test's duration.
    _assets_dir: TempDir,
}

async fn build_app(base_url: &str) -> TestApp {
    let store = Store::open_in_memory().await.expect("open store");
    let remote = RemoteSettings {
        base_url: Url::parse(base_url).expect("stub url"),
        timeout: Duration::from_secs(5),
    };
    let client = MoltbookClient::new(&remote, store.clone()).expect("client");
    let assets_dir = tempfile::tempdir().expect("tempdir");
    let assets = AssetDir::new(assets_dir.path().to_path_buf()).expect("asset dir");
    TestApp {
        router: build_router(HttpState::new(store.clone(), client, assets)),
        store,
        _assets_dir: assets_dir,
    }
}

async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8 body")
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .expect("request")
}

fn post_form(path: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn home_feed_without_key_falls_back_to_global() {
    let stub = Stub::new(vec![(
        "GET /api/v1/posts",
        json!([{"id": "p1", "title": "hello", "author": "alice", "upvotes": 3, "downvotes": 1}]),
    )]);
    let base = spawn_stub(stub.clone()).await;
    let app = build_app(&base).await;

    let response = app.router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("hello"));
    assert!(html.contains("Global Feed"));

    let hits = stub.hits();
    assert!(hits.contains(&"GET /api/v1/posts".to_string()));
    assert!(!hits.iter().any(|hit| hit.ends_with("/feed")));
}

#[tokio::test]
async fn home_feed_with_key_uses_personalized_endpoint() {
    let stub = Stub::new(vec![("GET /api/v1/feed", json!([]))]);
    let base = spawn_stub(stub.clone()).await;
    let app = build_app(&base).await;
    app.store.config_set("api_key", "k-123").await.unwrap();

    let response = app.router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(stub.hits().contains(&"GET /api/v1/feed".to_string()));
}

#[tokio::test]
async fn comment_creation_route_wins_over_post_detail() {
    let stub = Stub::new(vec![
        ("POST /api/v1/posts/p1/comments", json!({})),
        (
            "GET /api/v1/posts/p1/comments",
            json!([{"id": "c1", "author": "bob", "content": "first", "upvotes": 2, "downvotes": 0}]),
        ),
    ]);
    let base = spawn_stub(stub.clone()).await;
    let app = build_app(&base).await;

    let response = app
        .router
        .oneshot(post_form("/posts/p1/comments", "content=first"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("id=\"comment-c1\""));
    assert!(html.contains("Comment posted"));
    assert!(
        stub.hits()
            .contains(&"POST /api/v1/posts/p1/comments".to_string())
    );
}

#[tokio::test]
async fn post_upvote_returns_fresh_card_with_remote_score() {
    let stub = Stub::new(vec![
        ("POST /api/v1/posts/p1/upvote", json!({})),
        (
            "GET /api/v1/posts/p1",
            json!({"post": {"id": "p1", "title": "Voted", "author": "alice", "upvotes": 5, "downvotes": 2}}),
        ),
    ]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app
        .router
        .oneshot(post_form("/posts/p1/upvote", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    // upvotes minus downvotes from the re-fetch, not a local increment
    assert!(html.contains(">3<"));
    assert!(html.contains("hx-post=\"/posts/p1/downvote\""));
    assert!(html.contains("Upvoted"));
}

#[tokio::test]
async fn comment_vote_resolves_post_from_cache_and_returns_subtree() {
    let stub = Stub::new(vec![
        ("POST /api/v1/comments/c1/upvote", json!({})),
        (
            "GET /api/v1/posts/p1/comments",
            json!([
                {"id": "c1", "author": "bob", "content": "parent", "score": 4},
                {"id": "c2", "parent_id": "c1", "author": "eve", "content": "child", "score": 1},
                {"id": "c9", "author": "mallory", "content": "unrelated", "score": 0}
            ]),
        ),
    ]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;
    app.store
        .cache_comment(&moltchat::domain::Comment {
            id: "c1".into(),
            post_id: Some("p1".into()),
            author: "bob".into(),
            content: "parent".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(post_form("/comments/c1/upvote", ""))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("id=\"comment-c1\""));
    assert!(html.contains("id=\"comment-c2\""));
    assert!(!html.contains("id=\"comment-c9\""));
}

#[tokio::test]
async fn register_with_missing_fields_never_calls_remote() {
    let stub = Stub::new(vec![]);
    let base = spawn_stub(stub.clone()).await;
    let app = build_app(&base).await;

    let response = app
        .router
        .oneshot(post_form("/auth/register", "agent_name=&description="))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Agent name and description are required"));
    assert!(stub.hits().is_empty());
}

#[tokio::test]
async fn register_stores_returned_credentials() {
    let stub = Stub::new(vec![(
        "POST /api/v1/agents/register",
        json!({"api_key": "key-abc", "claim_url": "https://example.com/claim", "verification_code": "v-1"}),
    )]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app
        .router
        .oneshot(post_form(
            "/auth/register",
            "agent_name=crab&description=a+test+agent",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        app.store.config_get("api_key").await.unwrap().as_deref(),
        Some("key-abc")
    );
    assert_eq!(
        app.store.config_get("agent_name").await.unwrap().as_deref(),
        Some("crab")
    );
    assert_eq!(
        app.store
            .config_get("verification_code")
            .await
            .unwrap()
            .as_deref(),
        Some("v-1")
    );
}

#[tokio::test]
async fn submolt_directory_sorts_alphabetically_on_request() {
    let stub = Stub::new(vec![(
        "GET /api/v1/submolts",
        json!([
            {"name": "zeta", "subscriber_count": 10},
            {"name": "alpha", "subscriber_count": 2}
        ]),
    )]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app
        .router
        .oneshot(get("/submolts?sort=alpha"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    let alpha = html.find("/s/alpha").expect("alpha listed");
    let zeta = html.find("/s/zeta").expect("zeta listed");
    assert!(alpha < zeta);
}

#[tokio::test]
async fn asset_traversal_is_rejected_before_filesystem_access() {
    let stub = Stub::new(vec![]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app
        .router
        .oneshot(get("/assets/..%2Fsecret.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_asset_is_not_found() {
    let stub = Stub::new(vec![]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app.router.oneshot(get("/assets/nope.css")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn badge_failure_degrades_to_empty_badge() {
    // No canned response: the DM check 404s remotely.
    let stub = Stub::new(vec![]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app.router.oneshot(get("/messages/badge")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(!html.contains("dm-badge"));
}

#[tokio::test]
async fn responses_carry_security_headers() {
    let stub = Stub::new(vec![]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app.router.oneshot(get("/settings")).await.unwrap();
    let headers = response.headers();
    assert!(
        headers
            .get(header::CONTENT_SECURITY_POLICY)
            .is_some_and(|v| v.to_str().unwrap().contains("default-src 'self'"))
    );
    assert_eq!(
        headers.get(header::X_CONTENT_TYPE_OPTIONS).unwrap(),
        "nosniff"
    );
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");
}

#[tokio::test]
async fn unknown_route_renders_not_found_page() {
    let stub = Stub::new(vec![]);
    let base = spawn_stub(stub).await;
    let app = build_app(&base).await;

    let response = app.router.oneshot(get("/definitely/not/a/route")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let html = body_text(response).await;
    assert!(html.contains("Page Not Found"));
}

#[tokio::test]
async fn feed_fetch_failure_degrades_to_empty_feed() {
    let stub = Stub::new(vec![]);
    let base = spawn_stub(stub.clone()).await;
    let app = build_app(&base).await;

    let response = app.router.oneshot(get("/global")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Could not load feed"));
    assert!(html.contains("No posts yet"));
    assert_eq!(stub.hits(), vec!["GET /api/v1/posts"]);
}
