//! # Domain Entities
//!
//! Core domain entities of the messaging core. Each maps to a table.
//!
//! - **Conversation**: a two-party chat, unique per unordered participant pair
//! - **Message**: an immutable text message with a read flag
//! - **UserProfile**: read-only view of an account owned by the account service
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod conversation;
mod message;
mod user;

pub use conversation::{Conversation, ConversationRepository, ParticipantPair};
pub use message::{Message, MessageRepository};
pub use user::{UserDirectory, UserProfile};

#[cfg(test)]
pub use user::MockUserDirectory;
