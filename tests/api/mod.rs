//! REST API Tests

mod auth_tests;
mod conversation_tests;
mod health_tests;
mod message_tests;
mod query_tests;
mod user_tests;
