//! Integration Tests Entry Point
//!
//! Tests are organized by module:
//! - `api/` - REST API endpoint tests
//! - `realtime` - gateway authentication and message fan-out
//! - `common/` - Shared test utilities

mod api;
mod common;
mod realtime;
