use super::*;
use crate::state::test_helpers::spawn_http_server;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

fn fast_client(base_url: &str) -> DirectoryClient {
    let retry = RetryPolicy { retries: 3, base: Duration::from_millis(5) };
    DirectoryClient::new(base_url, "bot-token".into(), Duration::from_secs(2), retry).unwrap()
}

// =============================================================================
// RetryPolicy
// =============================================================================

#[test]
fn default_retry_policy_doubles_from_two_seconds() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.retries, 3);
    assert_eq!(policy.delay(1), Duration::from_secs(2));
    assert_eq!(policy.delay(2), Duration::from_secs(4));
    assert_eq!(policy.delay(3), Duration::from_secs(8));
}

// =============================================================================
// Pure helpers
// =============================================================================

#[test]
fn parse_body_rejects_html() {
    let err = parse_body::<UserProfile>("  <html><body>login</body></html>").unwrap_err();
    assert!(matches!(err, DirectoryError::Parse(msg) if msg.contains("HTML")));
}

#[test]
fn truncate_caps_long_bodies() {
    let long = "x".repeat(ERROR_BODY_LOG_LIMIT + 100);
    assert_eq!(truncate(&long).len(), ERROR_BODY_LOG_LIMIT);
    assert_eq!(truncate("short"), "short");
}

#[test]
fn thread_replies_skip_root_and_missing_ids() {
    let list: PostList = serde_json::from_value(json!({
        "order": ["r", "a", "ghost", "b"],
        "posts": {
            "r": { "id": "r", "user_id": "u", "channel_id": "c" },
            "a": { "id": "a", "user_id": "u", "channel_id": "c", "root_id": "r" },
            "b": { "id": "b", "user_id": "u", "channel_id": "c", "root_id": "r" }
        }
    }))
    .unwrap();
    let ids: Vec<String> = thread_replies(list, "r").into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

// =============================================================================
// HTTP behavior against a local fake server
// =============================================================================

async fn flaky_user(State(hits): State<Arc<AtomicUsize>>, Path(id): Path<String>) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) < 2 {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    Json(json!({ "id": id, "username": "alice", "email": "alice@example.test" })).into_response()
}

#[tokio::test]
async fn get_user_retries_server_errors() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/users/{id}", get(flaky_user))
        .with_state(hits.clone());
    let base = spawn_http_server(router).await;

    let user = fast_client(&base).get_user("u1").await.unwrap().unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.email.as_deref(), Some("alice@example.test"));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

async fn always_unavailable(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::BAD_GATEWAY
}

#[tokio::test]
async fn get_post_gives_up_after_retry_budget() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/posts/{id}", get(always_unavailable))
        .with_state(hits.clone());
    let base = spawn_http_server(router).await;

    let err = fast_client(&base).get_post("p1").await.unwrap_err();
    assert!(matches!(err, DirectoryError::Status { status: 502, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

async fn missing(State(hits): State<Arc<AtomicUsize>>) -> StatusCode {
    hits.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

#[tokio::test]
async fn get_user_not_found_is_none_without_retry() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/users/{id}", get(missing))
        .with_state(hits.clone());
    let base = spawn_http_server(router).await;

    assert!(fast_client(&base).get_user("nobody").await.unwrap().is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

async fn reject_post(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::BAD_REQUEST, r#"{"message":"invalid channel"}"#)
}

#[tokio::test]
async fn create_post_client_error_is_not_retried() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/posts", post(reject_post))
        .with_state(hits.clone());
    let base = spawn_http_server(router).await;

    let request = CreatePostRequest {
        channel_id: "c1".into(),
        message: "hello".into(),
        root_id: None,
        props: None,
        file_ids: None,
    };
    let err = fast_client(&base).create_post(&request).await.unwrap_err();
    match err {
        DirectoryError::Status { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid channel"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

async fn echo_direct_channel(headers: HeaderMap, Json(ids): Json<Vec<String>>) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if auth != "Bearer bot-token" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "id": format!("{}__{}", ids[0], ids[1]), "type": "D", "name": "dm" })).into_response()
}

#[tokio::test]
async fn create_direct_channel_sends_bearer_and_user_pair() {
    let router = Router::new().route("/channels/direct", post(echo_direct_channel));
    let base = spawn_http_server(router).await;

    let channel = fast_client(&format!("{base}/"))
        .create_direct_channel("bot", "alice")
        .await
        .unwrap();
    assert_eq!(channel.id, "bot__alice");
    assert_eq!(channel.kind, "D");
}

async fn thread_root(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({ "id": id, "user_id": "u", "channel_id": "c", "message": "root", "create_at": 1 }))
}

async fn thread_listing(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({
        "order": ["b", id.clone(), "a"],
        "posts": {
            id.clone(): { "id": id.clone(), "user_id": "u", "channel_id": "c" },
            "a": { "id": "a", "user_id": "u", "channel_id": "c", "root_id": id.clone(), "create_at": 2 },
            "b": { "id": "b", "user_id": "u", "channel_id": "c", "root_id": id, "create_at": 3 }
        }
    }))
}

#[tokio::test]
async fn get_thread_returns_root_and_replies() {
    let router = Router::new()
        .route("/posts/{id}", get(thread_root))
        .route("/posts/{id}/thread", get(thread_listing));
    let base = spawn_http_server(router).await;

    let (root, replies) = fast_client(&base).get_thread("r1").await.unwrap();
    assert_eq!(root.id, "r1");
    assert_eq!(root.message, "root");
    let ids: Vec<&str> = replies.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

// =============================================================================
// Path encoding
// =============================================================================

type SeenPaths = Arc<Mutex<Vec<String>>>;

async fn record_path(State(seen): State<SeenPaths>, uri: Uri) -> StatusCode {
    seen.lock().unwrap().push(uri.path().to_string());
    StatusCode::NOT_FOUND
}

async fn recording_server() -> (String, SeenPaths) {
    let seen = SeenPaths::default();
    let router = Router::new().fallback(record_path).with_state(seen.clone());
    (spawn_http_server(router).await, seen)
}

#[tokio::test]
async fn username_with_reserved_characters_stays_one_segment() {
    let (base, seen) = recording_server().await;

    let user = fast_client(&base).get_user_by_username("../admin?x=1#frag").await.unwrap();
    assert!(user.is_none());
    assert_eq!(*seen.lock().unwrap(), vec!["/users/username/..%2Fadmin%3Fx=1%23frag".to_string()]);
}

#[tokio::test]
async fn ids_are_appended_under_the_api_base() {
    let (base, seen) = recording_server().await;

    let client = fast_client(&format!("{base}/api/v4/"));
    assert!(client.get_user("u 1").await.unwrap().is_none());
    assert!(client.get_thread("a/b").await.unwrap_err().is_not_found());
    assert_eq!(*seen.lock().unwrap(), vec!["/api/v4/users/u%201".to_string(), "/api/v4/posts/a%2Fb".to_string()]);
}

#[tokio::test]
async fn dot_segments_never_reach_the_server() {
    let (base, seen) = recording_server().await;
    let client = fast_client(&base);

    assert!(client.get_user_by_username("..").await.unwrap().is_none());
    assert!(client.get_user("").await.unwrap().is_none());
    let err = client.get_post(".").await.unwrap_err();
    assert!(matches!(err, DirectoryError::InvalidId(_)));
    assert!(err.is_not_found());
    assert!(!err.retryable());
    assert!(seen.lock().unwrap().is_empty());
}

#[test]
fn relative_base_url_is_rejected() {
    let err = DirectoryClient::new("chat.example.test/api/v4", "t".into(), Duration::from_secs(1), RetryPolicy::default())
        .err()
        .expect("relative base should fail");
    assert!(matches!(err, DirectoryError::InvalidUrl(_)));
}
