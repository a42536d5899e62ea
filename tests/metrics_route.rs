// tests/metrics_route.rs
//
// The Prometheus exposition route. Kept in its own integration binary
// because installing the global recorder can only happen once per process.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use tower::ServiceExt as _;

use dialogue_engine::config::EngineConfig;
use dialogue_engine::metrics;

#[tokio::test(flavor = "multi_thread")]
async fn metrics_route_serves_exposition_text() {
    let handle = metrics::install(&EngineConfig::default());
    let app = metrics::exposition_route(handle);

    let req = Request::builder()
        .method("GET")
        .uri("/metrics")
        .body(Body::empty())
        .expect("build GET /metrics");
    let resp = app.oneshot(req).await.expect("oneshot /metrics");
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .expect("read body")
        .to_vec();
    // Exposition format is plain text; with no traffic yet it may be
    // empty, but the route itself must answer.
    assert!(String::from_utf8(bytes).is_ok());
}
