//! Infrastructure Layer
//!
//! Contains implementations for external services including:
//! - Database repositories (PostgreSQL) and in-memory stand-ins
//! - Redis-backed user profile cache
//! - Prometheus metrics

pub mod cache;
pub mod database;
pub mod metrics;
pub mod repositories;
