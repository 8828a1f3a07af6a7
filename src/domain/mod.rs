//! # Domain Layer
//!
//! Entities, the query DSL with its compiler, and the ports the application
//! layer is written against. Nothing here talks to a database or a socket.
//!
//! ## Structure
//!
//! - **entities**: User, Conversation, Message, Presence, ...
//! - **query**: Query DSL, path trees and the compiler
//! - **schema**: Static table/column/relation metadata
//! - **ports**: RecordStore, QueryCache, TokenService, ConnectionPusher

pub mod entities;
pub mod ports;
pub mod query;
pub mod schema;

pub use entities::*;
