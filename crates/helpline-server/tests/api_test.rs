//! HTTP API tests
//!
//! Requests go straight into the router with `tower::ServiceExt::oneshot`;
//! no socket is bound. `MockConnectInfo` supplies the caller address.

use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroUsize,
    sync::Arc,
};

use axum::{
    Router,
    body::Body,
    extract::connect_info::MockConnectInfo,
    http::{Request, StatusCode, header},
};
use base64::{Engine, engine::general_purpose};
use helpline_core::{ManualClock, MemoryStorage, QueuePolicy, QueueStore, SecretIssuer};
use helpline_server::{AccessConfig, AccessFilter, Credentials, HelpDesk, NoReverseLookup};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const CAMPUS: [u8; 4] = [206, 87, 122, 200];
const OUTSIDE: [u8; 4] = [8, 8, 8, 8];

struct TestApp {
    router: Router,
    desk: Arc<HelpDesk<ManualClock, MemoryStorage>>,
}

fn app_with(policy: QueuePolicy, caller: [u8; 4], filtered: bool) -> TestApp {
    let store = QueueStore::new(ManualClock::at_epoch(), MemoryStorage::new(), policy);
    let access = filtered.then(|| {
        let config = AccessConfig {
            allowed_ranges: vec!["206.87.0.0/16".to_string()],
            trusted_suffix: Some(".ubc.ca.".to_string()),
        };
        AccessFilter::from_config(&config, NoReverseLookup).unwrap()
    });
    let desk = Arc::new(HelpDesk::new(
        Arc::new(store),
        SecretIssuer::new(b"api seed").unwrap(),
        Credentials::from_pairs([("ta", "pass")]),
        access,
    ));

    let peer = SocketAddr::new(IpAddr::from(caller), 40_000);
    let router = helpline_server::router(Arc::clone(&desk)).layer(MockConnectInfo(peer));
    TestApp { router, desk }
}

fn app() -> TestApp {
    app_with(QueuePolicy::default(), CAMPUS, true)
}

fn basic(username: &str, password: &str) -> String {
    format!("Basic {}", general_purpose::STANDARD.encode(format!("{username}:{password}")))
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn staff_post(uri: &str, body: &Value) -> Request<Body> {
    let mut request = post(uri, body);
    request.headers_mut().insert(header::AUTHORIZATION, basic("ta", "pass").parse().unwrap());
    request
}

fn staff_get(uri: &str) -> Request<Body> {
    Request::get(uri).header(header::AUTHORIZATION, basic("ta", "pass")).body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, body)
}

async fn join(app: &TestApp, student_id: &str, name: &str) -> (StatusCode, Value) {
    send(app, post("/join", &json!({ "student_id": student_id, "name": name, "task_info": "lab" })))
        .await
}

#[tokio::test]
async fn join_returns_tagged_outcome() {
    let app = app();

    let (status, body) = join(&app, "a1b2", "Ada").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "joined");
    assert_eq!(body["ahead_of_me"], 0);
    assert_eq!(body["estimated_wait_secs"], Value::Null);
    assert_eq!(body["secret"].as_str().map(str::len), Some(64));

    let (status, body) = join(&app, "c3d4", "Bob").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ahead_of_me"], 1);

    let (status, body) = join(&app, "a1b2", "Ada").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "outcome": "already_queued", "position": 0 }));
}

#[tokio::test]
async fn join_rejects_invalid_input_with_422() {
    let app = app();

    let (status, body) = join(&app, "12ab", "Ada").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("invalid student id"));

    let (status, _) = join(&app, "a1b2", " ").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.desk.status().waiting.is_empty());
}

#[tokio::test]
async fn join_from_outside_network_is_forbidden() {
    let app = app_with(QueuePolicy::default(), OUTSIDE, true);

    let (status, _) = join(&app, "a1b2", "Ada").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let unfiltered = app_with(QueuePolicy::default(), OUTSIDE, false);
    let (status, body) = join(&unfiltered, "a1b2", "Ada").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "joined");
}

#[tokio::test]
async fn rate_limited_and_closed_outcomes() {
    let app = app_with(QueuePolicy::with_max_times_helped(NonZeroUsize::MIN), CAMPUS, true);

    join(&app, "a1b2", "Ada").await;
    let (status, body) = send(&app, staff_post("/staff/serve", &json!({ "student_id": "a1b2" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["served"], 1);

    let (_, body) = join(&app, "a1b2", "Ada").await;
    assert_eq!(body, json!({ "outcome": "rate_limited", "times_helped": 1 }));

    let (_, body) = send(&app, staff_post("/staff/close", &json!({}))).await;
    assert_eq!(body["is_open"], false);

    let (status, body) = join(&app, "c3d4", "Bob").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "outcome": "closed" }));

    let (_, body) = send(&app, staff_post("/staff/open", &json!({}))).await;
    assert_eq!(body["is_open"], true);
}

#[tokio::test]
async fn staff_routes_require_basic_auth() {
    let app = app();
    join(&app, "a1b2", "Ada").await;

    let response = app
        .router
        .clone()
        .oneshot(post("/staff/serve", &json!({ "student_id": "a1b2" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let mut wrong = post("/staff/serve", &json!({ "student_id": "a1b2" }));
    wrong.headers_mut().insert(header::AUTHORIZATION, basic("ta", "nope").parse().unwrap());
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let anonymous_dump = Request::get("/staff/dump").body(Body::empty()).unwrap();
    let (status, _) = send(&app, anonymous_dump).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(app.desk.store().has_open_ticket("a1b2"));
}

#[tokio::test]
async fn staff_auth_is_checked_before_body() {
    let app = app();
    join(&app, "a1b2", "Ada").await;

    for uri in ["/staff/serve", "/staff/reset"] {
        let garbage = Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _) = send(&app, garbage).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");

        let untyped = Request::post(uri).body(Body::from("student_id=a1b2")).unwrap();
        let (status, _) = send(&app, untyped).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    // Authenticated staff with a bad body get the extractor's rejection.
    let mut bad_body = Request::post("/staff/serve")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    bad_body.headers_mut().insert(header::AUTHORIZATION, basic("ta", "pass").parse().unwrap());
    let response = app.router.clone().oneshot(bad_body).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(app.desk.store().has_open_ticket("a1b2"));
}

#[tokio::test]
async fn staff_queue_reports_help_counts() {
    let app = app();
    join(&app, "a1b2", "Ada").await;
    send(&app, staff_post("/staff/serve", &json!({ "student_id": "a1b2" }))).await;
    join(&app, "c3d4", "Bob").await;
    join(&app, "a1b2", "Ada").await;

    let (status, body) = send(&app, staff_get("/staff/queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["student_id"], "c3d4");
    assert_eq!(body[0]["times_helped"], 0);
    assert_eq!(body[1]["student_id"], "a1b2");
    assert_eq!(body[1]["times_helped"], 1);
}

#[tokio::test]
async fn status_and_position() {
    let app = app();
    join(&app, "a1b2", "Ada").await;
    join(&app, "c3d4", "Bob").await;

    let (status, body) = send(&app, Request::get("/status").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_open"], true);
    assert_eq!(body["total_served"], 0);
    assert_eq!(body["waiting"][1]["student_id"], "c3d4");
    assert_eq!(body["waiting"][1]["name"], "Bob");
    assert!(body["waiting"][0].get("served_at").is_none());

    let (_, body) = send(&app, Request::get("/position/c3d4").body(Body::empty()).unwrap()).await;
    assert_eq!(body["position"], 1);

    let (_, body) = send(&app, Request::get("/position/e5f6").body(Body::empty()).unwrap()).await;
    assert_eq!(body["position"], Value::Null);

    let (status, _) = send(&app, Request::get("/position/zzzz").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn leave_with_issued_secret() {
    let app = app();
    let (_, body) = join(&app, "a1b2", "Ada").await;
    let secret = body["secret"].as_str().unwrap().to_string();

    let (status, _) =
        send(&app, post("/leave", &json!({ "student_id": "a1b2", "secret": "00" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) =
        send(&app, post("/leave", &json!({ "student_id": "a1b2", "secret": secret }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["left"], 1);
    assert!(!app.desk.store().has_open_ticket("a1b2"));
}

#[tokio::test]
async fn reset_requires_confirmation() {
    let app = app();
    join(&app, "a1b2", "Ada").await;

    let (_, body) = send(&app, staff_post("/staff/reset", &json!({}))).await;
    assert_eq!(body["reset"], false);
    assert_eq!(app.desk.status().waiting.len(), 1);

    let (_, body) = send(&app, staff_post("/staff/reset", &json!({ "confirm": true }))).await;
    assert_eq!(body["reset"], true);
    assert!(app.desk.status().waiting.is_empty());
}

#[tokio::test]
async fn dump_and_staff_queue() {
    let app = app();
    join(&app, "a1b2", "Ada").await;

    let response = app.router.clone().oneshot(staff_get("/staff/dump")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let document: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(document["tickets"][0]["student_id"], "a1b2");
    assert_eq!(document["tickets"][0]["served"], false);

    let (status, body) = send(&app, staff_get("/staff/queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["student_id"], "a1b2");
    assert_eq!(body[0]["times_helped"], 0);
}
