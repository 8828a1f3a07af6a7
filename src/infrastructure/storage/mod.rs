//! Record stores.
//!
//! Implementations of the `RecordStore` port:
//! - `PgStore`: PostgreSQL through sqlx
//! - `MemoryStore`: process-local tables for development and tests

pub mod eval;
mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;
