//! Shared counter store abstraction.
//!
//! All mutable rate-limiting state (window counters, the block list) lives
//! in a shared, network-accessible store. The store must offer an atomic
//! increment; the limiter never performs a read-modify-write itself.

mod redis;

#[cfg(test)]
pub(crate) mod mock;

pub use self::redis::{RedisStore, RedisStoreConfig};

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;

/// A shared key/value store offering atomic counters with expiry and a
/// scored set for block-list membership.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the counter under `key` and returns the
    /// post-increment value. The increment must be a single store-side
    /// operation, not a client-side compare-and-swap loop.
    async fn increment(&self, key: &str) -> Result<u64>;

    /// Sets the time-to-live of `key` in seconds.
    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()>;

    /// Reads the counter under `key` without incrementing it, 0 if absent.
    async fn read_count(&self, key: &str) -> Result<u64>;

    /// Adds `ip` to the block list, scored by `blocked_at` (Unix seconds).
    /// Re-adding an already blocked address updates its score.
    async fn block(&self, ip: &str, blocked_at: u64) -> Result<()>;

    /// Removes `ip` from the block list.
    async fn unblock(&self, ip: &str) -> Result<()>;

    /// Determines whether `ip` is currently on the block list.
    async fn is_blocked(&self, ip: &str) -> Result<bool>;

    /// Returns up to `max` of the most recently blocked addresses.
    async fn blocked_ips(&self, max: usize) -> Result<HashSet<String>>;

    /// Removes all block-list entries scored at or below `cutoff` and
    /// returns the number removed.
    async fn remove_blocks_before(&self, cutoff: u64) -> Result<u64>;

    /// Probes whether the store is reachable.
    async fn ping(&self) -> Result<()>;
}
