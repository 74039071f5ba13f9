//! Authentication Middleware
//!
//! Bearer-token validation for protected routes. Tokens are HS256 JWTs
//! issued by the account service; `sub` carries the user id.

use axum::{
    extract::{Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtSettings;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at time (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
}

/// Authenticated user extension
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Bearer token from the `Authorization` header, if present and well-formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Verify a token and return the user id it was issued for.
pub fn decode_token(settings: &JwtSettings, token: &str) -> Result<Uuid, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    match &settings.audience {
        Some(audience) => validation.set_audience(&[audience]),
        None => validation.validate_aud = false,
    }
    if let Some(issuer) = &settings.issuer {
        validation.set_issuer(&[issuer]);
    }

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AppError::Unauthorized("Token expired".into()),
        _ => AppError::Unauthorized("Invalid token".into()),
    })?;

    token_data
        .claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token claims".into()))
}

/// Query string of the gateway upgrade request.
#[derive(Debug, Deserialize)]
pub struct GatewayAuthQuery {
    pub access_token: Option<String>,
}

/// Authentication for the push-channel upgrade.
///
/// Browsers cannot set headers on a websocket handshake, so the token may
/// also come as `?access_token=`. The query parameter wins when both are set.
pub async fn gateway_auth_middleware(
    State(state): State<AppState>,
    Query(query): Query<GatewayAuthQuery>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = query
        .access_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(request.headers()))
        .ok_or_else(|| AppError::Unauthorized("Missing access token".into()))?;

    let user_id = decode_token(&state.settings.jwt, &token)?;
    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let user_id = decode_token(&state.settings.jwt, &token)?;
    request.extensions_mut().insert(AuthUser { user_id });

    Ok(next.run(request).await)
}
