//! CORS Middleware Configuration

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::CorsSettings;

/// Create CORS layer from settings.
///
/// Browser clients send the bearer token on both the REST calls and the
/// gateway upgrade, so credentials are always allowed. With no configured
/// origins the request origin is mirrored back.
pub fn create_cors_layer(settings: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let base = CorsLayer::new()
        .allow_credentials(true)
        .expose_headers([header::CONTENT_DISPOSITION]);

    if origins.is_empty() {
        base.allow_origin(AllowOrigin::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
    } else {
        base.allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(Duration::from_secs(3600))
    }
}
