//! Push Gateway Upgrade Tests
//!
//! The handshake itself needs a real socket; these cover the checks that run before it.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use uuid::Uuid;

use crate::common::{token_for, TestApp};

#[tokio::test]
async fn test_gateway_without_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, _) = app.get("/gateway", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gateway_with_bad_query_token_is_unauthorized() {
    let app = TestApp::new();
    let (status, _) = app.get("/gateway?access_token=garbage", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_gateway_token_accepted_from_query_or_header() {
    let app = TestApp::new();
    let token = token_for(Uuid::new_v4());

    // Authenticated, but a plain GET is not an upgrade request.
    let (status, _) = app.get(&format!("/gateway?access_token={token}"), None).await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);
    assert!(status.is_client_error());

    let (status, _) = app
        .request(
            Request::get("/gateway")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_ne!(status, StatusCode::UNAUTHORIZED);
}
