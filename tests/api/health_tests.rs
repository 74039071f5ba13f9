//! Health Check API Tests

use axum::http::StatusCode;

use crate::common::TestApp;

#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();
    let (status, body) = app.get("/health/live", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
}

#[tokio::test]
async fn test_readiness_reports_store_and_gateway() {
    let app = TestApp::new();
    let (status, body) = app.get("/health/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "healthy");
    assert_eq!(body["checks"]["gateway"]["active_connections"], 0);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_prometheus_text() {
    let app = TestApp::new();
    app.get("/health/live", None).await;

    let response = {
        use axum::body::{to_bytes, Body};
        use axum::http::Request;
        use tower::ServiceExt;

        let response = app
            .router
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        to_bytes(response.into_body(), usize::MAX).await.unwrap()
    };

    let text = String::from_utf8(response.to_vec()).unwrap();
    assert!(text.contains("dm_server_http_requests_total"));
}
