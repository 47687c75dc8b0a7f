mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use parley_server::api;
use parley_server::config::Config;
use parley_server::state::AppState;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _tmp: TempDir,
}

fn test_app() -> TestApp {
    let tmp = TempDir::new().expect("tempdir");
    let mut config = Config::default();
    config.storage.db_path = tmp.path().join("parley.db").to_string_lossy().to_string();
    config.auth.seed_users = vec!["bob".to_string(), "carol".to_string()];
    let runtime = Arc::new(common::EchoRuntime::default());
    let state = Arc::new(AppState::new(config, runtime).expect("build state"));
    TestApp {
        router: api::build_router(state.clone()),
        state,
        _tmp: tmp,
    }
}

async fn call(app: &TestApp, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .router
        .clone()
        .oneshot(request)
        .await
        .expect("route request");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    let payload = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, headers, payload)
}

fn login_request(username: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}")))
        .expect("build request")
}

fn agent_request(cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/agent")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie.to_string());
    }
    builder.body(Body::from(body.to_string())).expect("build request")
}

fn history_request(cookie: Option<&str>, session_id: Option<&str>) -> Request<Body> {
    let uri = match session_id {
        Some(id) => format!("/api/session-history?sessionId={id}"),
        None => "/api/session-history".to_string(),
    };
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie.to_string());
    }
    builder.body(Body::empty()).expect("build request")
}

/// Logs in and returns the cookie pair to send back, e.g. `username=bob`.
async fn login(app: &TestApp, username: &str) -> String {
    let (status, headers, payload) = call(app, login_request(username)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({ "success": true }));
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("set-cookie header");
    cookie.split(';').next().expect("cookie pair").to_string()
}

#[tokio::test]
async fn login_rejects_unknown_and_empty_usernames() {
    let app = test_app();

    let (status, _, payload) = call(&app, login_request("alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload, json!({ "error": "user_not_found" }));

    let (status, _, payload) = call(&app, login_request("")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload, json!({ "error": "username_required" }));

    let (status, _, payload) = call(&app, login_request("%20%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload, json!({ "error": "username_required" }));
}

#[tokio::test]
async fn login_sets_a_scoped_expiring_cookie() {
    let app = test_app();
    let (status, headers, _) = call(&app, login_request("bob")).await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("set-cookie header");
    assert!(cookie.starts_with("username=bob; "));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=3600"));
    // Development mode keeps the cookie usable over plain HTTP.
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn message_endpoint_validates_before_touching_any_state() {
    let app = test_app();
    let cookie = login(&app, "bob").await;

    let (status, _, payload) = call(&app, agent_request(Some(&cookie), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "empty_body");

    let (status, _, payload) = call(&app, agent_request(Some(&cookie), "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "invalid_json");

    let (status, _, payload) =
        call(&app, agent_request(Some(&cookie), r#"{"text":"hello"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "message_required");

    let (status, _, payload) = call(&app, agent_request(Some(&cookie), r#"{"message":7}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "invalid_message");

    // None of the rejected requests may create or modify a session row.
    assert!(app
        .state
        .storage
        .find_session_by_user("bob")
        .expect("session lookup")
        .is_none());
}

#[tokio::test]
async fn message_endpoint_requires_identity() {
    let app = test_app();

    let (status, _, payload) =
        call(&app, agent_request(None, r#"{"message":"hello"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payload, json!({ "error": "auth_required" }));

    // A cookie naming an unknown user is not an identity.
    let (status, _, _) = call(
        &app,
        agent_request(Some("username=mallory"), r#"{"message":"hello"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(app
        .state
        .storage
        .find_session_by_user("bob")
        .expect("session lookup")
        .is_none());
}

#[tokio::test]
async fn conversation_round_trip_reuses_the_session() {
    let app = test_app();
    let cookie = login(&app, "bob").await;

    let (status, _, payload) =
        call(&app, agent_request(Some(&cookie), r#"{"message":"hello"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["userId"], "bob");
    let session_id = payload["sessionId"].as_str().expect("session id").to_string();
    assert!(!session_id.is_empty());
    // The response carries this exchange's raw events, marker and
    // bookkeeping included.
    let produced = payload["events"].as_array().expect("events array");
    assert_eq!(produced.len(), 2);
    assert!(produced[0]["usageMetadata"].is_object());

    let row = app
        .state
        .storage
        .get_session(&session_id)
        .expect("session lookup")
        .expect("session row");
    assert_eq!(row.user_id, "bob");

    let (status, _, payload) =
        call(&app, agent_request(Some(&cookie), r#"{"message":"again"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["sessionId"], session_id.as_str());

    // Persisted history covers both exchanges, sanitized: the empty-parts
    // markers and the bookkeeping fields are gone.
    let (status, _, payload) =
        call(&app, history_request(Some(&cookie), Some(&session_id))).await;
    assert_eq!(status, StatusCode::OK);
    let events = payload["events"].as_array().expect("events array");
    assert_eq!(events.len(), 4);
    assert_eq!(events[0]["content"]["role"], "user");
    assert_eq!(events[1]["content"]["role"], "model");
    assert!(events.iter().all(|event| event.get("usageMetadata").is_none()));
}

#[tokio::test]
async fn history_is_gated_by_identity_and_ownership() {
    let app = test_app();
    let bob = login(&app, "bob").await;
    let (_, _, payload) =
        call(&app, agent_request(Some(&bob), r#"{"message":"hello"}"#)).await;
    let session_id = payload["sessionId"].as_str().expect("session id").to_string();

    let (status, _, payload) = call(&app, history_request(None, Some(&session_id))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(payload["error"], "auth_required");

    let (status, _, payload) = call(&app, history_request(Some(&bob), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(payload["error"], "session_id_required");

    let (status, _, payload) =
        call(&app, history_request(Some(&bob), Some("no-such-session"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(payload["error"], "session_not_found");

    let carol = login(&app, "carol").await;
    let (status, _, payload) =
        call(&app, history_request(Some(&carol), Some(&session_id))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(payload["error"], "access_denied");
}

#[tokio::test]
async fn logout_clears_the_cookie_unconditionally() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .body(Body::empty())
        .expect("build request");
    let (status, headers, payload) = call(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({ "success": true }));
    let cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .expect("set-cookie header");
    assert!(cookie.starts_with("username=; "));
    assert!(cookie.contains("Max-Age=0"));

    // Once the browser drops the cookie, protected endpoints reject again.
    let (status, _, _) = call(&app, agent_request(None, r#"{"message":"hi"}"#)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn corrupt_stored_blob_reads_as_empty_history() {
    let app = test_app();
    let cookie = login(&app, "bob").await;
    app.state
        .storage
        .upsert_session_events("sess-corrupt", "bob", "{definitely not json")
        .expect("seed corrupt row");

    let (status, _, payload) =
        call(&app, history_request(Some(&cookie), Some("sess-corrupt"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload, json!({ "events": [] }));
}
