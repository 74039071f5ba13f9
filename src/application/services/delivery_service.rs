//! Delivery Service
//!
//! Operations invoked over a live push connection. Storage goes through
//! [`ChatServiceImpl`]; this layer adds the fan-out to connected clients.

use std::sync::Arc;

use uuid::Uuid;

use super::chat_service::{ChatError, ChatServiceImpl, MessageDto};
use super::presence::{ChatEvent, ConnectionHandle};
use crate::infrastructure::metrics;

/// The authenticated identity behind a push connection, plus that connection.
#[derive(Debug, Clone)]
pub struct PushCaller {
    pub user_id: Uuid,
    pub connection: ConnectionHandle,
}

/// Push-channel messaging operations.
pub struct DeliveryService {
    chat: Arc<ChatServiceImpl>,
}

impl DeliveryService {
    pub fn new(chat: Arc<ChatServiceImpl>) -> Self {
        Self { chat }
    }

    /// Send `text` from the caller to `receiver_id`.
    ///
    /// Blank text is dropped without error and returns `Ok(None)`. Otherwise
    /// the conversation is resolved (created on first contact), the message
    /// stored, echoed to the calling connection and pushed to every live
    /// connection of the receiver. An offline receiver picks it up on the
    /// next fetch.
    pub async fn send_message(
        &self,
        caller: &PushCaller,
        receiver_id: Uuid,
        text: &str,
    ) -> Result<Option<MessageDto>, ChatError> {
        if text.trim().is_empty() {
            tracing::trace!(user_id = %caller.user_id, "Dropping blank message");
            return Ok(None);
        }

        let (conversation, stored) = self
            .chat
            .append_to_pair(caller.user_id, receiver_id, text)
            .await?;
        let message = MessageDto::from(stored);
        metrics::record_message_sent("push");

        let event = ChatEvent::ReceiveMessage(message.clone());
        caller.connection.push(event.clone());
        let delivered = self.chat.presence().send(receiver_id, event);

        tracing::debug!(
            chat_id = %conversation.id,
            sender_id = %caller.user_id,
            receiver_id = %receiver_id,
            delivered,
            "Message delivered"
        );

        Ok(Some(message))
    }

    /// Mark the other participant's messages in `chat_id` as read.
    ///
    /// A `MESSAGES_READ` receipt goes to the other participant's live
    /// connections only when something actually changed.
    pub async fn mark_messages_as_read(
        &self,
        caller: &PushCaller,
        chat_id: Uuid,
    ) -> Result<u64, ChatError> {
        let conversation = self
            .chat
            .participant_conversation(caller.user_id, chat_id)
            .await?;
        self.chat
            .reconcile_read(&conversation, caller.user_id, true)
            .await
    }
}
