//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod auth;
pub mod conversation;
pub mod health;
pub mod message;
pub mod presence;
pub mod profile;
pub mod query;
pub mod user;
pub mod user_conversation;
