//! Response DTOs
//!
//! Data structures for API response bodies. Conversation and message bodies
//! reuse the service DTOs directly.

use serde::Serialize;
use uuid::Uuid;

pub use crate::application::services::{ConversationDto, MessageDto, ParticipantDto};

/// Mark-read acknowledgement
#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub chat_id: Uuid,
    pub marked: u64,
}
