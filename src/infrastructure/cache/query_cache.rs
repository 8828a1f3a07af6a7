//! Query Cache
//!
//! Read-through cache for compiled queries. Entries are keyed by a hash that
//! includes the table generation; a write bumps the generation so stale
//! entries are simply never looked up again and age out by TTL.
//!
//! Two implementations:
//! - `RedisQueryCache`: shared between instances, backed by a ConnectionManager
//! - `MemoryQueryCache`: process-local, backed by DashMap

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::keys;
use crate::domain::ports::QueryCache;

/// Redis-backed query cache.
#[derive(Clone)]
pub struct RedisQueryCache {
    conn: ConnectionManager,
}

impl RedisQueryCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl QueryCache for RedisQueryCache {
    #[instrument(skip(self), level = "debug")]
    async fn generation(&self, table: &str) -> u64 {
        let mut conn = self.conn.clone();
        let result: Result<Option<u64>, _> = conn.get(keys::generation(table)).await;
        match result {
            Ok(value) => value.unwrap_or(0),
            Err(e) => {
                warn!(error = %e, table = table, "Failed to read cache generation");
                0
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = self.conn.clone();
        let result: Result<Option<String>, _> = conn.get(keys::entry(key)).await;

        match result {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => {
                    debug!(key = key, "Query cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(error = %e, key = key, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                debug!(key = key, "Query cache miss");
                None
            }
            Err(e) => {
                warn!(error = %e, key = key, "Query cache read failed");
                None
            }
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn put(&self, key: &str, value: &Value, ttl_ms: u64) {
        let data = value.to_string();
        let mut conn = self.conn.clone();
        let result: Result<(), _> = conn.pset_ex(keys::entry(key), data, ttl_ms).await;
        if let Err(e) = result {
            warn!(error = %e, key = key, "Query cache write failed");
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn invalidate(&self, table: &str) {
        let mut conn = self.conn.clone();
        let result: Result<u64, _> = conn.incr(keys::generation(table), 1u64).await;
        match result {
            Ok(generation) => debug!(table = table, generation = generation, "Query cache invalidated"),
            Err(e) => warn!(error = %e, table = table, "Query cache invalidation failed"),
        }
    }
}

/// In-process query cache.
#[derive(Default)]
pub struct MemoryQueryCache {
    entries: DashMap<String, (Value, Instant)>,
    generations: DashMap<String, u64>,
}

impl MemoryQueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl QueryCache for MemoryQueryCache {
    async fn generation(&self, table: &str) -> u64 {
        self.generations.get(table).map(|g| *g).unwrap_or(0)
    }

    async fn get(&self, key: &str) -> Option<Value> {
        let hit = match self.entries.get(key) {
            Some(entry) if entry.1 > Instant::now() => return Some(entry.0.clone()),
            Some(_) => true,
            None => false,
        };
        if hit {
            self.entries.remove(key);
        }
        None
    }

    async fn put(&self, key: &str, value: &Value, ttl_ms: u64) {
        let expires = Instant::now() + Duration::from_millis(ttl_ms);
        self.entries.insert(key.to_string(), (value.clone(), expires));
    }

    async fn invalidate(&self, table: &str) {
        *self.generations.entry(table.to_string()).or_insert(0) += 1;
        // Entries of older generations are unreachable now.
        let prefix = format!("{}:", table);
        self.entries.retain(|key, _| !key.starts_with(&prefix));
    }
}
