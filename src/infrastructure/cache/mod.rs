//! Cache Module
//!
//! Redis connection management and the query cache.
//!
//! ```text
//! +-------------------+
//! |   RecordService   |
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | QueryCache (port) |
//! +-------------------+
//!          |
//!     +----+-----+
//!     v          v
//!  Redis      DashMap
//! ```

mod query_cache;

pub use query_cache::{MemoryQueryCache, RedisQueryCache};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

/// Creates a Redis connection manager with automatic reconnection.
#[instrument]
pub async fn create_redis_client(url: &str) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(url)?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Cache key layout.
///
/// Entry keys are `<table>:<sha256>` so the in-process cache can drop a
/// table's entries by prefix.
pub mod keys {
    /// Prefix for query result entries (e.g., "query:users:ab12...")
    pub const QUERY: &str = "query:";

    /// Prefix for per-table generation counters (e.g., "query:gen:users")
    pub const GENERATION: &str = "query:gen:";

    #[inline]
    pub fn entry(key: &str) -> String {
        format!("{}{}", QUERY, key)
    }

    #[inline]
    pub fn generation(table: &str) -> String {
        format!("{}{}", GENERATION, table)
    }
}
