//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::conversation::{Conversation, ConversationRepository, ParticipantPair};
use crate::shared::error::AppError;

/// A message inside a two-party conversation.
///
/// Maps to the `messages` table:
/// - id: UUID PRIMARY KEY (UUIDv7, time ordered)
/// - chat_id: UUID NOT NULL REFERENCES chats(id)
/// - sender_id: UUID NOT NULL
/// - message_text: TEXT NOT NULL
/// - sent_at: TIMESTAMPTZ NOT NULL
/// - is_read: BOOLEAN NOT NULL DEFAULT FALSE
///
/// Text and sender never change after insert. `is_read` only ever goes
/// from false to true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub message_text: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

impl Message {
    /// Compose an unread message from `sender_id` in `conversation`.
    ///
    /// The timestamp is never earlier than the conversation's creation, even
    /// if the wall clock stepped backwards in between.
    pub fn compose(conversation: &Conversation, sender_id: Uuid, text: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            chat_id: conversation.id,
            sender_id,
            message_text: text.into(),
            sent_at: now.max(conversation.created_at),
            is_read: false,
        }
    }
}

/// Repository trait for Message data access operations.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Persist a new message and return the stored record.
    async fn append(&self, message: &Message) -> Result<Message, AppError>;

    /// All messages of a conversation ordered by `sent_at`, then insertion.
    async fn list_by_conversation(&self, chat_id: Uuid) -> Result<Vec<Message>, AppError>;

    /// Mark every unread message in `chat_id` not sent by `reader_id` as read.
    ///
    /// Returns the number of rows that flipped; a repeated call returns 0.
    async fn mark_read_except_sender(&self, chat_id: Uuid, reader_id: Uuid) -> Result<u64, AppError>;

    /// Resolve the pair's conversation (creating it on first contact) and
    /// append one message from `sender_id` to it.
    ///
    /// Stores that share a database with `conversations` override this to
    /// run both steps in one transaction, so a failed append leaves no
    /// empty conversation behind.
    async fn append_to_pair(
        &self,
        conversations: &dyn ConversationRepository,
        pair: ParticipantPair,
        sender_id: Uuid,
        text: String,
    ) -> Result<(Conversation, Message), AppError> {
        let conversation = conversations.find_or_create(pair).await?;
        let message = self
            .append(&Message::compose(&conversation, sender_id, text))
            .await?;
        Ok((conversation, message))
    }
}
