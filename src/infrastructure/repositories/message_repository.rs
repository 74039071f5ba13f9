//! Message Repository Implementation
//!
//! PostgreSQL implementation of the append-only message log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::conversation_repository::ConversationRow;
use crate::domain::{Conversation, ConversationRepository, Message, MessageRepository, ParticipantPair};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// Maps to the messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    chat_id: Uuid,
    sender_id: Uuid,
    message_text: String,
    sent_at: DateTime<Utc>,
    is_read: bool,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id,
            sender_id: self.sender_id,
            message_text: self.message_text,
            sent_at: self.sent_at,
            is_read: self.is_read,
        }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn append(&self, message: &Message) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, chat_id, sender_id, message_text, sent_at, is_read)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, chat_id, sender_id, message_text, sent_at, is_read
            "#,
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(&message.message_text)
        .bind(message.sent_at)
        .bind(message.is_read)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }

    /// Ids are UUIDv7, so `id` breaks ties between equal timestamps in send order.
    async fn list_by_conversation(&self, chat_id: Uuid) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, chat_id, sender_id, message_text, sent_at, is_read
            FROM messages
            WHERE chat_id = $1
            ORDER BY sent_at ASC, id ASC
            "#,
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }

    async fn mark_read_except_sender(&self, chat_id: Uuid, reader_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = TRUE
            WHERE chat_id = $1 AND sender_id <> $2 AND is_read = FALSE
            "#,
        )
        .bind(chat_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// First-contact send in one transaction.
    ///
    /// Under READ COMMITTED the `ON CONFLICT DO NOTHING` waits for a
    /// concurrent inserter of the same pair, and the re-read that follows
    /// sees its committed row.
    async fn append_to_pair(
        &self,
        _conversations: &dyn ConversationRepository,
        pair: ParticipantPair,
        sender_id: Uuid,
        text: String,
    ) -> Result<(Conversation, Message), AppError> {
        let (low, high) = pair.ordered();
        let mut tx = self.pool.begin().await?;

        let select_pair = r#"
            SELECT id, user1_id, user2_id, created_at
            FROM chats
            WHERE LEAST(user1_id, user2_id) = $1
              AND GREATEST(user1_id, user2_id) = $2
            "#;

        let existing = sqlx::query_as::<_, ConversationRow>(select_pair)
            .bind(low)
            .bind(high)
            .fetch_optional(&mut *tx)
            .await?;

        let mut created = false;
        let conversation = match existing {
            Some(row) => row.into_conversation(),
            None => {
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
                .fetch_optional(&mut *tx)
                .await?;

                match inserted {
                    Some(row) => {
                        created = true;
                        row.into_conversation()
                    }
                    None => sqlx::query_as::<_, ConversationRow>(select_pair)
                        .bind(low)
                        .bind(high)
                        .fetch_optional(&mut *tx)
                        .await?
                        .map(ConversationRow::into_conversation)
                        .ok_or_else(|| {
                            AppError::Internal("Conversation vanished during first contact".into())
                        })?,
                }
            }
        };

        let message = Message::compose(&conversation, sender_id, text);
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, chat_id, sender_id, message_text, sent_at, is_read)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, chat_id, sender_id, message_text, sent_at, is_read
            "#,
        )
        .bind(message.id)
        .bind(message.chat_id)
        .bind(message.sender_id)
        .bind(&message.message_text)
        .bind(message.sent_at)
        .bind(message.is_read)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if created {
            metrics::record_conversation_created();
            tracing::info!(chat_id = %conversation.id, "Conversation created on first contact");
        }
        Ok((conversation, row.into_message()))
    }
}
