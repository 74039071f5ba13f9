//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **ChatService**: conversation resolution, message storage, read reconciliation
//! - **DeliveryService**: push-connection operations with live fan-out
//! - **PresenceDirectory**: contract for reaching online identities

pub mod chat_service;
pub mod delivery_service;
pub mod presence;

pub use chat_service::{
    ChatError, ChatService, ChatServiceImpl, ConversationDto, MessageDto, ParticipantDto,
};
pub use delivery_service::{DeliveryService, PushCaller};
pub use presence::{ChatEvent, ConnectionHandle, PresenceDirectory};
