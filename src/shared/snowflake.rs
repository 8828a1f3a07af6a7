//! Snowflake ID Generator
//!
//! Twitter-style distributed unique ID generation:
//! 41 bits of milliseconds since [`EPOCH`], 5 bits machine, 5 bits node and a
//! 12 bit per-millisecond sequence.

use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Custom epoch (2020-01-01T00:00:00.000Z)
pub const EPOCH: u64 = 1_577_836_800_000;

const SEQUENCE_MASK: u64 = 0xFFF;

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    machine_id: u64,
    node_id: u64,
    /// (last timestamp, sequence within that millisecond)
    state: Mutex<(u64, u64)>,
}

impl SnowflakeGenerator {
    /// Create a new snowflake generator
    pub fn new(machine_id: u64, node_id: u64) -> Self {
        Self {
            machine_id: machine_id & 0x1F, // 5 bits
            node_id: node_id & 0x1F,       // 5 bits
            state: Mutex::new((0, 0)),
        }
    }

    /// Generate a new snowflake ID
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock();
        let mut timestamp = current_timestamp().max(state.0);

        if timestamp == state.0 {
            state.1 = (state.1 + 1) & SEQUENCE_MASK;
            if state.1 == 0 {
                // Sequence exhausted for this millisecond.
                while timestamp <= state.0 {
                    std::hint::spin_loop();
                    timestamp = current_timestamp();
                }
            }
        } else {
            state.1 = 0;
        }
        state.0 = timestamp;

        let id = ((timestamp.saturating_sub(EPOCH)) << 22)
            | (self.machine_id << 17)
            | (self.node_id << 12)
            | state.1;

        id as i64
    }
}

/// Current timestamp in milliseconds
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(EPOCH)
}

/// Extract timestamp from snowflake ID
pub fn extract_timestamp(snowflake: i64) -> u64 {
    ((snowflake as u64) >> 22) + EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique() {
        let gen = SnowflakeGenerator::new(1, 1);
        let ids: HashSet<i64> = (0..10_000).map(|_| gen.generate()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_ids_increase() {
        let gen = SnowflakeGenerator::new(1, 1);
        let first = gen.generate();
        let second = gen.generate();
        assert!(second > first);
    }

    #[test]
    fn test_extract_timestamp() {
        let gen = SnowflakeGenerator::new(1, 1);
        let id = gen.generate();
        let ts = extract_timestamp(id);
        let now = current_timestamp();
        assert!(ts <= now);
        assert!(ts > now - 1000); // Within 1 second
    }
}
