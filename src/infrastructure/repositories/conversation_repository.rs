//! Conversation Repository Implementation
//!
//! PostgreSQL implementation of conversation storage. The unordered-pair
//! uniqueness is enforced by the `chats_participant_pair_key` expression
//! index, so find-or-create stays correct under concurrent first contact.

use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Conversation, ConversationRepository, ParticipantPair};
use crate::infrastructure::{database, metrics};
use crate::shared::error::AppError;

/// Attempts before giving up on find-or-create. A miss after `ON CONFLICT DO
/// NOTHING` only happens if the competing insert rolled back.
const FIND_OR_CREATE_ATTEMPTS: usize = 3;

/// PostgreSQL conversation repository implementation.
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    /// Creates a new PgConversationRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for conversation queries.
#[derive(Debug, sqlx::FromRow)]
pub(super) struct ConversationRow {
    id: Uuid,
    user1_id: Uuid,
    user2_id: Uuid,
    created_at: DateTime<Utc>,
}

impl ConversationRow {
    pub(super) fn into_conversation(self) -> Conversation {
        Conversation {
            id: self.id,
            user1_id: self.user1_id,
            user2_id: self.user2_id,
            created_at: self.created_at,
        }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Conversation>, AppError> {
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user1_id, user2_id, created_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConversationRow::into_conversation))
    }

    async fn find_by_pair(&self, pair: ParticipantPair) -> Result<Option<Conversation>, AppError> {
        let (low, high) = pair.ordered();
        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user1_id, user2_id, created_at
            FROM chats
            WHERE LEAST(user1_id, user2_id) = $1
              AND GREATEST(user1_id, user2_id) = $2
            "#,
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ConversationRow::into_conversation))
    }

    async fn find_for_participant(&self, user_id: Uuid) -> Result<Vec<Conversation>, AppError> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user1_id, user2_id, created_at
            FROM chats
            WHERE user1_id = $1 OR user2_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ConversationRow::into_conversation).collect())
    }

    async fn insert(&self, conversation: &Conversation) -> Result<Conversation, AppError> {
        let result = sqlx::query_as::<_, ConversationRow>(
            r#"
            INSERT INTO chats (id, user1_id, user2_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user1_id, user2_id, created_at
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.user1_id)
        .bind(conversation.user2_id)
        .bind(conversation.created_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                metrics::record_conversation_created();
                Ok(row.into_conversation())
            }
            Err(e) if is_unique_violation(&e) => {
                Err(AppError::Conflict("Chat already exists".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert-if-absent against the pair index, then read back.
    ///
    /// `ON CONFLICT DO NOTHING` waits for a concurrent inserter of the same
    /// pair to finish, and the follow-up SELECT runs with a fresh snapshot,
    /// so both callers end up with the one committed row.
    async fn find_or_create(&self, pair: ParticipantPair) -> Result<Conversation, AppError> {
        let start = Instant::now();

        for attempt in 1..=FIND_OR_CREATE_ATTEMPTS {
            if let Some(existing) = self.find_by_pair(pair).await? {
                metrics::record_db_query("find_or_create", "chats", start.elapsed().as_secs_f64());
                return Ok(existing);
            }

            let candidate = Conversation::start(pair);
            let inserted = sqlx::query_as::<_, ConversationRow>(
                r#"
                INSERT INTO chats (id, user1_id, user2_id, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT ((LEAST(user1_id, user2_id)), (GREATEST(user1_id, user2_id)))
                DO NOTHING
                RETURNING id, user1_id, user2_id, created_at
                "#,
            )
            .bind(candidate.id)
            .bind(candidate.user1_id)
            .bind(candidate.user2_id)
            .bind(candidate.created_at)
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = inserted {
                metrics::record_conversation_created();
                metrics::record_db_query("find_or_create", "chats", start.elapsed().as_secs_f64());
                tracing::info!(chat_id = %row.id, "Conversation created on first contact");
                return Ok(row.into_conversation());
            }

            tracing::debug!(attempt, "Lost find-or-create race, re-reading pair");
        }

        self.find_by_pair(pair).await?.ok_or_else(|| {
            AppError::Internal("Conversation vanished during find-or-create".into())
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        database::report_pool_stats(&self.pool);
        Ok(())
    }
}

/// These run against a real database: `DATABASE_URL=... cargo test -- --ignored`.
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pair() -> (Uuid, Uuid) {
        (Uuid::new_v4(), Uuid::new_v4())
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_find_or_create_matches_reversed_pair(pool: PgPool) {
        let repo = PgConversationRepository::new(pool);
        let (a, b) = pair();

        let first = repo
            .find_or_create(ParticipantPair::new(a, b).unwrap())
            .await
            .unwrap();
        let second = repo
            .find_or_create(ParticipantPair::new(b, a).unwrap())
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(repo.find_for_participant(b).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_first_contact_creates_one_row(pool: PgPool) {
        let repo = Arc::new(PgConversationRepository::new(pool.clone()));
        let (a, b) = pair();

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = repo.clone();
            let (x, y) = if i % 2 == 0 { (a, b) } else { (b, a) };
            handles.push(tokio::spawn(async move {
                repo.find_or_create(ParticipantPair::new(x, y).unwrap())
                    .await
                    .unwrap()
                    .id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chats")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_insert_reversed_pair_is_conflict(pool: PgPool) {
        let repo = PgConversationRepository::new(pool);
        let (a, b) = pair();
        repo.insert(&Conversation::start(ParticipantPair::new(a, b).unwrap()))
            .await
            .unwrap();

        let result = repo
            .insert(&Conversation::start(ParticipantPair::new(b, a).unwrap()))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }
}
