//! # Chat Backend Library
//!
//! Multi-tenant chat backend with:
//! - A query DSL compiled into store-native conditions, served by one
//!   generic record service for every entity
//! - RESTful HTTP API for users, profiles, conversations and messages
//! - WebSocket gateway with presence tracking and message fan-out
//! - PostgreSQL or in-memory storage, Redis or in-process query cache
//!
//! ## Module Structure
//!
//! ```text
//! chat_backend/
//! +-- config/         Configuration management
//! +-- domain/         Entities, query DSL + compiler, ports
//! +-- application/    Record service, domain services, fan-out, DTOs
//! +-- infrastructure/ Storage, cache, auth and metrics implementations
//! +-- presentation/   HTTP routes, middleware and WebSocket gateway
//! +-- shared/         Common utilities (errors, snowflake IDs, validation)
//! ```

// Configuration module
pub mod config;

// Domain layer - entities, query DSL and ports
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
