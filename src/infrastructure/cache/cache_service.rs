//! Cache Service
//!
//! Key/value cache trait and its Redis implementation. Values are stored as
//! JSON strings; typed access goes through [`get_json`] and [`set_json_ex`].

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};

use crate::shared::error::AppError;

/// Minimal string cache used by the read-through decorators.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns `Ok(None)` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set_ex(&self, key: &str, value: String, seconds: u64) -> Result<(), AppError>;
}

/// Read a JSON value. An undecodable entry counts as a miss.
pub async fn get_json<T: DeserializeOwned>(cache: &dyn Cache, key: &str) -> Result<Option<T>, AppError> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            debug!(key, error = %e, "Discarding undecodable cache entry");
            Ok(None)
        }
    }
}

pub async fn set_json_ex<T: Serialize + Sync>(
    cache: &dyn Cache,
    key: &str,
    value: &T,
    seconds: u64,
) -> Result<(), AppError> {
    let raw = serde_json::to_string(value)
        .map_err(|e| AppError::Internal(format!("Serialization error: {}", e)))?;
    cache.set_ex(key, raw, seconds).await
}

/// Redis-backed cache over a shared connection manager.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    prefix: Option<String>,
}

impl RedisCache {
    /// `prefix` namespaces every key, e.g. to share one Redis between environments.
    pub fn new(conn: ConnectionManager, prefix: Option<String>) -> Self {
        Self { conn, prefix }
    }

    fn key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(self.key(key)).await?;
        Ok(value)
    }

    #[instrument(skip(self, value))]
    async fn set_ex(&self, key: &str, value: String, seconds: u64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(self.key(key), value, seconds).await?;
        Ok(())
    }
}
