//! Profile Cache
//!
//! Read-through cache in front of a [`UserDirectory`]. Cache failures are
//! logged and the lookup falls through to the wrapped directory.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;
use uuid::Uuid;

use super::cache_service::{get_json, set_json_ex, Cache};
use super::keys;
use crate::domain::{UserDirectory, UserProfile};
use crate::shared::error::AppError;

pub struct CachedUserDirectory<D> {
    inner: D,
    cache: Arc<dyn Cache>,
    ttl_secs: u64,
}

impl<D: UserDirectory> CachedUserDirectory<D> {
    pub fn new(inner: D, cache: Arc<dyn Cache>, ttl_secs: u64) -> Self {
        Self {
            inner,
            cache,
            ttl_secs,
        }
    }
}

#[async_trait]
impl<D: UserDirectory> UserDirectory for CachedUserDirectory<D> {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        let key = keys::user_profile(user_id);

        match get_json::<UserProfile>(self.cache.as_ref(), &key).await {
            Ok(Some(profile)) => return Ok(Some(profile)),
            Ok(None) => {}
            Err(e) => warn!(%user_id, error = %e, "Profile cache read failed"),
        }

        let profile = self.inner.find_profile(user_id).await?;

        // Misses are not cached; a user created later must become visible.
        if let Some(profile) = &profile {
            if let Err(e) = set_json_ex(self.cache.as_ref(), &key, profile, self.ttl_secs).await {
                warn!(%user_id, error = %e, "Profile cache write failed");
            }
        }

        Ok(profile)
    }
}
