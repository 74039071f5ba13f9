//! # Domain Layer
//!
//! Conversations, messages and the contracts for storing them. Nothing here
//! knows about HTTP, websockets or Postgres.
//!
//! ## Structure
//!
//! - **entities**: Conversation, Message, UserProfile and their repository traits
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain rules (participant checks, read-flag direction)

pub mod entities;

pub use entities::*;
