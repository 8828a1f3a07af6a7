//! Ports implemented by the infrastructure and presentation layers.
//!
//! Defined here so application services depend only on traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::query::NativeQuery;
use crate::domain::schema::EntitySchema;

/// A row as a JSON object keyed by column (and loaded relation) name.
pub type Document = Map<String, Value>;

/// Turns a `json!({...})` literal into a [`Document`]; non-objects become empty.
pub fn document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Document::new(),
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Errors raised by storage adapters. Never shown to clients.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

/// Storage port consumed by the generic record service.
///
/// Reads honour `deleted_at` unless `with_deleted` is set; writes only touch
/// live rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_id(
        &self,
        schema: &EntitySchema,
        id: i64,
        query: &NativeQuery,
    ) -> Result<Option<Document>, StoreError>;

    async fn find_one(
        &self,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Result<Option<Document>, StoreError>;

    /// Page of rows plus the total number of matches ignoring skip/take.
    async fn find_and_count(
        &self,
        schema: &EntitySchema,
        query: &NativeQuery,
    ) -> Result<(Vec<Document>, u64), StoreError>;

    async fn count(&self, schema: &EntitySchema, query: &NativeQuery) -> Result<u64, StoreError>;

    /// Inserts complete rows and returns them as stored.
    async fn insert(
        &self,
        schema: &EntitySchema,
        rows: Vec<Document>,
    ) -> Result<Vec<Document>, StoreError>;

    /// Applies `patch` to a live row and refreshes `updated_at`. Returns affected rows.
    async fn update_by_id(
        &self,
        schema: &EntitySchema,
        id: i64,
        patch: &Document,
    ) -> Result<u64, StoreError>;

    /// Sets `deleted_at` on live rows. Returns affected rows.
    async fn soft_delete(&self, schema: &EntitySchema, ids: &[i64]) -> Result<u64, StoreError>;

    /// Removes rows. Returns affected rows.
    async fn hard_delete(&self, schema: &EntitySchema, ids: &[i64]) -> Result<u64, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

// ============================================================================
// Query cache
// ============================================================================

/// Read-through cache for compiled queries.
///
/// Failures are the implementation's concern: a broken cache behaves as a miss.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Current generation of a table; part of every cache key.
    async fn generation(&self, table: &str) -> u64;

    async fn get(&self, key: &str) -> Option<Value>;

    async fn put(&self, key: &str, value: &Value, ttl_ms: u64);

    /// Bumps the table generation so older entries are never read again.
    async fn invalidate(&self, table: &str);
}

// ============================================================================
// Tokens
// ============================================================================

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i64,
    pub email: String,
    pub name: String,
    /// Expiry (unix seconds)
    pub exp: i64,
    /// Issued at (unix seconds)
    pub iat: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Issues and verifies access tokens.
pub trait TokenService: Send + Sync {
    fn issue(&self, user_id: i64, email: &str, name: &str) -> Result<String, TokenError>;

    fn verify(&self, token: &str) -> Result<Claims, TokenError>;

    /// Access token lifetime in seconds.
    fn expires_in(&self) -> i64;
}

// ============================================================================
// Real-time push
// ============================================================================

/// Outbound gateway event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushEvent {
    pub event: String,
    pub data: Value,
}

impl PushEvent {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Delivers events to live connections by id.
#[async_trait]
pub trait ConnectionPusher: Send + Sync {
    /// Best effort; returns `false` when the connection is gone.
    async fn push(&self, connection_id: &str, event: PushEvent) -> bool;
}
