//! # Direct Messaging Server Library
//!
//! One-to-one conversations between users, with:
//! - a REST API for listing, fetching, creating and writing to conversations
//! - a websocket push channel for live delivery, read receipts and presence
//! - PostgreSQL for persistent storage
//! - Redis for caching user profiles
//!
//! ## Architecture
//!
//! - **Domain Layer**: conversations, messages, user profiles and their store traits
//! - **Application Layer**: chat and delivery services, DTOs
//! - **Infrastructure Layer**: Postgres/in-memory stores, Redis cache, metrics
//! - **Presentation Layer**: HTTP handlers and the websocket gateway
//!
//! ```text
//! dm_server/
//! +-- config/         Configuration management
//! +-- domain/         Entities and repository traits
//! +-- application/    Services and DTOs
//! +-- infrastructure/ Database, cache and metrics
//! +-- presentation/   HTTP routes and websocket handlers
//! +-- shared/         Errors and validation
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
pub mod shared;
pub mod startup;
pub mod telemetry;
