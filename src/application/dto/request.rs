//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Create chat request
#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    /// The user to start a conversation with
    #[serde(alias = "otherUserId", alias = "user_id")]
    pub other_user_id: Uuid,
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[serde(alias = "chatId")]
    pub chat_id: Uuid,

    #[validate(length(max = 4000, message = "Message must be at most 4000 characters"))]
    pub text: String,
}
