//! Handler-level tests using tower::ServiceExt::oneshot.
//!
//! Tests the full Axum router (middleware + handlers) without binding a TCP
//! listener. Faster and more deterministic than E2E tests.

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use http_body_util::BodyExt;
use streamgate::config::Config;
use streamgate::proxy::normalize::DisguiseSignature;
use streamgate::server::build_router;
use tower::ServiceExt;

/// Build a test config with sensible defaults.
fn test_config() -> Config {
    Config {
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        is_dev: true,
        upstream_user_agent: "StreamgateTest/1.0".to_string(),
        rate_limit_rpm: 0,
        allow_private_networks: false,
        disguise: Some(DisguiseSignature::default()),
    }
}

// ── Health endpoint ─────────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_200_with_json() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert!(json["uptime_seconds"].is_number());
}

// ── Version header ──────────────────────────────────────────────────────────

#[tokio::test]
async fn all_responses_include_version_header() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    let version = resp
        .headers()
        .get("x-streamgate-version")
        .expect("missing X-Streamgate-Version header");

    assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
}

// ── 404 for unknown routes ──────────────────────────────────────────────────

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/nonexistent")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Metrics endpoint ────────────────────────────────────────────────────────

#[tokio::test]
async fn metrics_endpoint_renders() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ── CORS preflight ──────────────────────────────────────────────────────────

#[tokio::test]
async fn preflight_returns_204_with_cors_headers() {
    let app = build_router(test_config());

    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/proxy?url=https%3A%2F%2Fcdn.example%2Flive.m3u8")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let headers = resp.headers();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(
        headers.get("access-control-allow-methods").unwrap(),
        "GET, OPTIONS"
    );
    assert_eq!(
        headers.get("access-control-allow-headers").unwrap(),
        "Content-Type, Authorization, Range"
    );
    assert_eq!(headers.get("access-control-max-age").unwrap(), "86400");

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty(), "preflight body must be empty");
}

// ── Proxy request validation ────────────────────────────────────────────────

#[tokio::test]
async fn proxy_without_url_param_returns_400() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn proxy_with_relative_url_returns_400() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy?url=live%2Findex.m3u8")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn proxy_with_file_scheme_returns_400() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy?url=file%3A%2F%2F%2Fetc%2Fpasswd")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn proxy_to_private_address_returns_403() {
    // allow_private_networks is false in test_config
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy?url=http%3A%2F%2F169.254.169.254%2Flatest%2Fmeta-data%2F")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn proxy_error_responses_carry_cors_header() {
    let app = build_router(test_config());

    let req = Request::builder()
        .uri("/proxy")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

// ── Rate limiting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn rate_limiter_blocks_after_limit() {
    let mut config = test_config();
    config.rate_limit_rpm = 3; // Very low limit for testing

    let app = build_router(config);

    // Router implements Clone — clone before each oneshot call.
    for _ in 0..3 {
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // 4th request from same IP should be rate-limited
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
}

// ── Root route aliases ──────────────────────────────────────────────────────

#[tokio::test]
async fn root_path_returns_health() {
    let app = build_router(test_config());

    let req = Request::builder().uri("/").body(Body::empty()).unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}
