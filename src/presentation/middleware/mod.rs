//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod cors;
pub mod logging;

pub use auth::{
    auth_middleware, bearer_token, decode_token, gateway_auth_middleware, AuthUser, Claims,
};
