//! Repository Implementations
//!
//! Concrete implementations of the domain repository traits.
//!
//! - **PgConversationRepository** - conversations keyed by unordered participant pair
//! - **PgMessageRepository** - append-only message log with read flags
//! - **PgUserDirectory** - read-only profile lookups against `users`
//! - **InMemory\*** - process-local versions used by tests and local runs

pub mod conversation_repository;
pub mod memory;
pub mod message_repository;
pub mod user_directory;

pub use conversation_repository::PgConversationRepository;
pub use memory::{InMemoryConversationRepository, InMemoryMessageRepository, InMemoryUserDirectory};
pub use message_repository::PgMessageRepository;
pub use user_directory::PgUserDirectory;
