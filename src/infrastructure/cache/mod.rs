//! Cache Module
//!
//! Redis connection management and the profile read-through cache.

mod cache_service;
mod profile_cache;

pub use cache_service::{get_json, set_json_ex, Cache, RedisCache};
pub use profile_cache::CachedUserDirectory;

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key builders.
pub mod keys {
    /// Prefix for cached user profiles (e.g. "profile:<uuid>")
    pub const USER_PROFILE: &str = "profile:";

    #[inline]
    pub fn user_profile(user_id: impl std::fmt::Display) -> String {
        format!("{}{}", USER_PROFILE, user_id)
    }
}
