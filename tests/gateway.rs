use axum::{
    Router,
    body::{Body, Bytes},
    http::{Request, StatusCode},
    routing::post,
};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

use recipe_guard::clock::ManualClock;
use recipe_guard::handlers;
use recipe_guard::rate_limit::RateLimitStore;
use recipe_guard::state::AppState;
use recipe_guard::upstream::UpstreamPool;

// Stand-in for the recipe app
async fn spawn_upstream() -> String {
    let app = Router::new()
        .route(
            "/api/recipes",
            post(|| async { (StatusCode::CREATED, "created") }).get(|| async { "list" }),
        )
        .route(
            "/api/upload",
            post(|body: Bytes| async move { body.len().to_string() }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("127.0.0.1:{}", addr.port())
}

fn gateway(upstreams: &str, clock: Arc<ManualClock>) -> (Router, Arc<AppState>) {
    let store = Arc::new(RateLimitStore::new(clock));
    let pool = Arc::new(UpstreamPool::new(upstreams).unwrap());
    let state = Arc::new(AppState::new(reqwest::Client::new(), pool, store, &[]));
    (handlers::router(state.clone(), 1024 * 1024), state)
}

fn request(method: &str, uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap()
}

async fn json_body(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn third_recipe_create_is_throttled() {
    let upstream = spawn_upstream().await;
    let (app, _) = gateway(&upstream, Arc::new(ManualClock::new(0)));

    for remaining in ["1", "0"] {
        let resp = app
            .clone()
            .oneshot(request("POST", "/api/recipes", "1.2.3.4, 10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(resp.headers()["x-ratelimit-remaining"], remaining);
        assert_eq!(resp.headers()["x-ratelimit-limit"], "2");
    }

    let resp = app
        .clone()
        .oneshot(request("POST", "/api/recipes", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["retry-after"], "60");
    assert_eq!(resp.headers()["x-ratelimit-reset"], "60");
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert_eq!(body["error"]["action"], "recipe-create");
    assert_eq!(body["remaining"], 0);
    assert_eq!(body["resetTime"], 60_000);

    // another caller has its own quota
    let resp = app
        .clone()
        .oneshot(request("POST", "/api/recipes", "5.6.7.8"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn upload_quota_returns_after_window() {
    let upstream = spawn_upstream().await;
    let clock = Arc::new(ManualClock::new(0));
    let (app, state) = gateway(&upstream, clock.clone());

    let upload = || {
        Request::builder()
            .method("POST")
            .uri("/api/upload")
            .header("cf-connecting-ip", "9.9.9.9")
            .body(Body::from("jpegbytes"))
            .unwrap()
    };

    let resp = app.clone().oneshot(upload()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"9");

    clock.set(59_500);
    let resp = app.clone().oneshot(upload()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["retry-after"], "1");

    clock.set(60_000);
    assert_eq!(state.store.sweep(), 1);
    let resp = app.clone().oneshot(upload()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn reads_are_never_throttled() {
    let upstream = spawn_upstream().await;
    let (app, state) = gateway(&upstream, Arc::new(ManualClock::new(0)));

    for _ in 0..20 {
        let resp = app
            .clone()
            .oneshot(request("GET", "/api/recipes", "1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(!resp.headers().contains_key("x-ratelimit-remaining"));
    }
    assert!(state.store.is_empty());
}

#[tokio::test]
async fn health_reports_upstreams_and_keys() {
    let upstream = spawn_upstream().await;
    let (app, _) = gateway(&upstream, Arc::new(ManualClock::new(0)));

    app.clone()
        .oneshot(request("POST", "/api/recipes/1/like", "1.2.3.4"))
        .await
        .unwrap();

    let resp = app
        .clone()
        .oneshot(request("GET", "/health", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["upstreams"]["total"], 1);
    assert_eq!(body["trackedKeys"], 1);
}

#[tokio::test]
async fn unhealthy_pool_answers_503() {
    let upstream = spawn_upstream().await;
    let (app, state) = gateway(&upstream, Arc::new(ManualClock::new(0)));
    for u in state.upstreams.all() {
        u.set_healthy(false);
    }

    let resp = app
        .oneshot(request("GET", "/api/recipes", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unreachable_upstream_answers_502_and_is_marked_down() {
    // nothing listens on port 1
    let (app, state) = gateway("127.0.0.1:1", Arc::new(ManualClock::new(0)));

    let resp = app
        .oneshot(request("GET", "/api/recipes", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(state.upstreams.healthy_count(), 0);
}

#[tokio::test]
async fn truncated_upstream_body_answers_502_and_is_marked_down() {
    // promises 100 bytes, sends 7, hangs up
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 4096];
        let _ = socket.read(&mut buf).await;
        socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 100\r\n\r\npartial")
            .await
            .unwrap();
        socket.shutdown().await.unwrap();
    });

    let (app, state) = gateway(
        &format!("127.0.0.1:{}", addr.port()),
        Arc::new(ManualClock::new(0)),
    );

    let resp = app
        .oneshot(request("GET", "/api/recipes", "1.2.3.4"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(state.upstreams.healthy_count(), 0);
}
