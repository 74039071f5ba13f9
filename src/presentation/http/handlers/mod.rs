//! HTTP Handlers

pub mod chat;
pub mod health;
