//! Infrastructure Layer
//!
//! Implementations of the domain ports:
//! - Record stores (PostgreSQL, in-memory)
//! - Query cache (Redis, in-memory)
//! - Credentials (JWT, Argon2)
//! - Prometheus metrics

pub mod auth;
pub mod cache;
pub mod database;
pub mod metrics;
pub mod storage;
