//! Chat Service
//!
//! Conversation resolution, message storage and read-state reconciliation.
//! This is the durable half of messaging; both the REST API and the push
//! gateway go through it, so state is the same whichever door a client uses.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::presence::{ChatEvent, PresenceDirectory};
use crate::domain::{
    Conversation, ConversationRepository, Message, MessageRepository, ParticipantPair,
    UserDirectory, UserProfile,
};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Return the pair's conversation, creating it on first contact.
    async fn find_or_create(&self, user_a: Uuid, user_b: Uuid) -> Result<Conversation, ChatError>;

    /// Explicitly start a conversation. Fails if the pair already has one.
    async fn create_conversation(
        &self,
        requester_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<ConversationDto, ChatError>;

    /// Every conversation the caller takes part in, with messages and the other side's profile.
    async fn list_conversations(&self, caller_id: Uuid) -> Result<Vec<ConversationDto>, ChatError>;

    /// One conversation. Marks the other side's messages read as a side effect.
    async fn get_conversation(
        &self,
        caller_id: Uuid,
        chat_id: Uuid,
    ) -> Result<ConversationDto, ChatError>;

    /// Append a message to an existing conversation the caller belongs to.
    async fn send_message(
        &self,
        caller_id: Uuid,
        chat_id: Uuid,
        text: String,
    ) -> Result<MessageDto, ChatError>;

    /// Mark the other side's messages read. Returns how many flipped.
    async fn mark_read(&self, caller_id: Uuid, chat_id: Uuid) -> Result<u64, ChatError>;
}

/// Message data transfer object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageDto {
    pub message_id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub message_text: String,
    pub sent_at: DateTime<Utc>,
    pub is_read: bool,
}

impl From<Message> for MessageDto {
    fn from(message: Message) -> Self {
        Self {
            message_id: message.id,
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            message_text: message.message_text,
            sent_at: message.sent_at,
            is_read: message.is_read,
        }
    }
}

/// Public profile of the other participant, with live status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantDto {
    pub id: Uuid,
    pub user_name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub status: String,
}

impl ParticipantDto {
    fn from_profile(profile: UserProfile, online: bool) -> Self {
        Self {
            id: profile.id,
            user_name: profile.user_name,
            first_name: profile.first_name,
            last_name: profile.last_name,
            profile_picture_url: profile.profile_picture_url,
            status: if online { "online" } else { "offline" }.to_string(),
        }
    }
}

/// Conversation data transfer object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationDto {
    pub chat_id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageDto>,
    pub other_user: ParticipantDto,
}

/// Chat service errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    NotFound(String),

    #[error("Chat already exists")]
    AlreadyExists,

    #[error("Cannot start a chat with yourself")]
    SelfConversation,

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<AppError> for ChatError {
    fn from(error: AppError) -> Self {
        ChatError::Storage(error.to_string())
    }
}

impl From<ChatError> for AppError {
    fn from(error: ChatError) -> Self {
        match error {
            ChatError::NotFound(msg) => AppError::NotFound(msg),
            ChatError::AlreadyExists => AppError::BadRequest("Chat already exists".into()),
            ChatError::SelfConversation => AppError::BadRequest(error.to_string()),
            ChatError::Storage(msg) => AppError::Internal(msg),
        }
    }
}

const NO_ACCESS: &str = "Chat not found or you don't have access";

/// ChatService implementation
pub struct ChatServiceImpl {
    conversations: Arc<dyn ConversationRepository>,
    messages: Arc<dyn MessageRepository>,
    directory: Arc<dyn UserDirectory>,
    presence: Arc<dyn PresenceDirectory>,
    rest_push_fanout: bool,
}

impl ChatServiceImpl {
    pub fn new(
        conversations: Arc<dyn ConversationRepository>,
        messages: Arc<dyn MessageRepository>,
        directory: Arc<dyn UserDirectory>,
        presence: Arc<dyn PresenceDirectory>,
    ) -> Self {
        Self {
            conversations,
            messages,
            directory,
            presence,
            rest_push_fanout: false,
        }
    }

    /// Also push REST-originated messages and read receipts to live connections.
    pub fn with_rest_push_fanout(mut self, enabled: bool) -> Self {
        self.rest_push_fanout = enabled;
        self
    }

    pub fn presence(&self) -> &Arc<dyn PresenceDirectory> {
        &self.presence
    }

    /// Load a conversation the caller belongs to, or `NotFound`.
    pub async fn participant_conversation(
        &self,
        caller_id: Uuid,
        chat_id: Uuid,
    ) -> Result<Conversation, ChatError> {
        self.conversations
            .find_by_id(chat_id)
            .await?
            .filter(|c| c.has_participant(caller_id))
            .ok_or_else(|| ChatError::NotFound(NO_ACCESS.into()))
    }

    /// Store a message from `sender_id`. The caller has already checked participation.
    pub async fn append(
        &self,
        conversation: &Conversation,
        sender_id: Uuid,
        text: impl Into<String> + Send,
    ) -> Result<Message, ChatError> {
        debug_assert!(conversation.has_participant(sender_id));
        let message = Message::compose(conversation, sender_id, text);
        let stored = self.messages.append(&message).await?;
        Ok(stored)
    }

    /// Resolve the conversation with `receiver_id` and store a message in it
    /// as one unit. Used by first-contact sends.
    pub async fn append_to_pair(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: impl Into<String> + Send,
    ) -> Result<(Conversation, Message), ChatError> {
        let pair = ParticipantPair::new(sender_id, receiver_id).ok_or(ChatError::SelfConversation)?;
        let stored = self
            .messages
            .append_to_pair(self.conversations.as_ref(), pair, sender_id, text.into())
            .await?;
        Ok(stored)
    }

    /// Flip the other side's unread messages to read.
    ///
    /// When something changed and `notify` is set, the other participant's
    /// live connections get a `MESSAGES_READ` receipt.
    pub async fn reconcile_read(
        &self,
        conversation: &Conversation,
        reader_id: Uuid,
        notify: bool,
    ) -> Result<u64, ChatError> {
        let changed = self
            .messages
            .mark_read_except_sender(conversation.id, reader_id)
            .await?;

        if changed > 0 {
            metrics::record_read_receipt(changed);
            tracing::debug!(
                chat_id = %conversation.id,
                reader_id = %reader_id,
                changed,
                "Messages marked as read"
            );

            if notify {
                if let Some(other) = conversation.other_participant(reader_id) {
                    self.presence.send(
                        other,
                        ChatEvent::MessagesRead {
                            chat_id: conversation.id,
                        },
                    );
                }
            }
        }

        Ok(changed)
    }

    fn build_dto(
        &self,
        conversation: Conversation,
        profile: UserProfile,
        messages: Vec<Message>,
    ) -> ConversationDto {
        let online = self.presence.is_online(profile.id);
        ConversationDto {
            chat_id: conversation.id,
            user1_id: conversation.user1_id,
            user2_id: conversation.user2_id,
            created_at: conversation.created_at,
            messages: messages.into_iter().map(MessageDto::from).collect(),
            other_user: ParticipantDto::from_profile(profile, online),
        }
    }
}

#[async_trait]
impl ChatService for ChatServiceImpl {
    async fn find_or_create(&self, user_a: Uuid, user_b: Uuid) -> Result<Conversation, ChatError> {
        let pair = ParticipantPair::new(user_a, user_b).ok_or(ChatError::SelfConversation)?;
        let conversation = self.conversations.find_or_create(pair).await?;
        Ok(conversation)
    }

    async fn create_conversation(
        &self,
        requester_id: Uuid,
        other_user_id: Uuid,
    ) -> Result<ConversationDto, ChatError> {
        let pair =
            ParticipantPair::new(requester_id, other_user_id).ok_or(ChatError::SelfConversation)?;

        if self.conversations.find_by_pair(pair).await?.is_some() {
            return Err(ChatError::AlreadyExists);
        }

        let profile = self
            .directory
            .find_profile(other_user_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("Other user not found".into()))?;

        // The unique index still wins if another request slipped in between.
        let conversation = match self.conversations.insert(&Conversation::start(pair)).await {
            Ok(c) => c,
            Err(AppError::Conflict(_)) => return Err(ChatError::AlreadyExists),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            chat_id = %conversation.id,
            requester_id = %requester_id,
            other_user_id = %other_user_id,
            "Conversation created"
        );

        Ok(self.build_dto(conversation, profile, Vec::new()))
    }

    async fn list_conversations(&self, caller_id: Uuid) -> Result<Vec<ConversationDto>, ChatError> {
        let conversations = self.conversations.find_for_participant(caller_id).await?;

        let other_ids: Vec<Uuid> = conversations
            .iter()
            .filter_map(|c| c.other_participant(caller_id))
            .collect();
        let mut profiles: HashMap<Uuid, UserProfile> = self
            .directory
            .find_profiles(&other_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut result = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let Some(other_id) = conversation.other_participant(caller_id) else {
                continue;
            };
            // Accounts removed from the directory drop out of the list.
            let Some(profile) = profiles.remove(&other_id) else {
                tracing::debug!(chat_id = %conversation.id, other_id = %other_id, "Skipping chat with unknown user");
                continue;
            };

            let messages = self.messages.list_by_conversation(conversation.id).await?;
            result.push(self.build_dto(conversation, profile, messages));
        }

        Ok(result)
    }

    async fn get_conversation(
        &self,
        caller_id: Uuid,
        chat_id: Uuid,
    ) -> Result<ConversationDto, ChatError> {
        let conversation = self.participant_conversation(caller_id, chat_id).await?;
        let other_id = conversation
            .other_participant(caller_id)
            .ok_or_else(|| ChatError::NotFound(NO_ACCESS.into()))?;

        let profile = self
            .directory
            .find_profile(other_id)
            .await?
            .ok_or_else(|| ChatError::NotFound("Other user not found".into()))?;

        // Snapshot first: the caller sees which messages were still unread.
        let messages = self.messages.list_by_conversation(conversation.id).await?;
        self.reconcile_read(&conversation, caller_id, self.rest_push_fanout)
            .await?;

        Ok(self.build_dto(conversation, profile, messages))
    }

    async fn send_message(
        &self,
        caller_id: Uuid,
        chat_id: Uuid,
        text: String,
    ) -> Result<MessageDto, ChatError> {
        let conversation = self.participant_conversation(caller_id, chat_id).await?;
        let message = MessageDto::from(self.append(&conversation, caller_id, text).await?);
        metrics::record_message_sent("rest");

        if self.rest_push_fanout {
            if let Some(receiver) = conversation.other_participant(caller_id) {
                self.presence
                    .send(receiver, ChatEvent::ReceiveMessage(message.clone()));
            }
        }

        Ok(message)
    }

    async fn mark_read(&self, caller_id: Uuid, chat_id: Uuid) -> Result<u64, ChatError> {
        let conversation = self.participant_conversation(caller_id, chat_id).await?;
        self.reconcile_read(&conversation, caller_id, self.rest_push_fanout)
            .await
    }
}
