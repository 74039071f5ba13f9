//! User Directory Implementation
//!
//! Reads public profile fields from the account service's `users` table.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{UserDirectory, UserProfile};
use crate::shared::error::AppError;

/// PostgreSQL-backed user directory.
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    user_name: String,
    first_name: Option<String>,
    last_name: Option<String>,
    profile_picture_url: Option<String>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            user_name: row.user_name,
            first_name: row.first_name,
            last_name: row.last_name,
            profile_picture_url: row.profile_picture_url,
        }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, user_name, first_name, last_name, profile_picture_url
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(UserProfile::from))
    }

    async fn find_profiles(&self, user_ids: &[Uuid]) -> Result<Vec<UserProfile>, AppError> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT id, user_name, first_name, last_name, profile_picture_url
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(UserProfile::from).collect())
    }
}
