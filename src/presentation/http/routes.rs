//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::{auth_middleware, gateway_auth_middleware, logging};
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/chats", chat_routes(state.clone()))
        // Push channel; the token is checked before the upgrade
        .route(
            "/gateway",
            get(ws_handler).route_layer(middleware::from_fn_with_state(
                state.clone(),
                gateway_auth_middleware,
            )),
        )
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(logging::track_metrics))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}

/// Chat routes (protected)
fn chat_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::chat::list_chats))
        .route("/{chat_id}", get(handlers::chat::get_chat))
        .route("/create", post(handlers::chat::create_chat))
        .route("/message", post(handlers::chat::send_message))
        .route("/read/{chat_id}", post(handlers::chat::mark_read))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
