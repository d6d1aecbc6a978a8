//! Redis-backed counter store.
//!
//! Counters are plain keys driven by INCR and EXPIRE; the block list is a
//! single sorted set scored by block timestamp, so membership is a ZSCORE
//! lookup and cleanup is a ZREMRANGEBYSCORE over the stale score range.

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use super::CounterStore;
use crate::config::StoreConfig;
use crate::error::Result;

/// Configuration for the Redis store.
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL, e.g. "redis://127.0.0.1/"
    pub url: String,
    /// Prefix applied to every key written by this store
    pub key_prefix: String,
    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
    /// Timeout for a single command; an elapsed timeout surfaces as a store
    /// error and is handled by the fail-open policy
    pub response_timeout: Duration,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1/".to_string(),
            key_prefix: "isenguard:".to_string(),
            connect_timeout: Duration::from_secs(2),
            response_timeout: Duration::from_secs(2),
        }
    }
}

impl From<StoreConfig> for RedisStoreConfig {
    fn from(config: StoreConfig) -> Self {
        Self {
            url: config.url,
            key_prefix: config.key_prefix,
            ..RedisStoreConfig::default()
        }
    }
}

/// Redis-backed implementation of [`CounterStore`].
///
/// The connection manager reconnects transparently; cloning it hands out
/// another handle onto the same multiplexed connection.
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to Redis with default configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(RedisStoreConfig {
            url: url.to_string(),
            ..RedisStoreConfig::default()
        })
        .await
    }

    /// Connect to Redis with custom configuration.
    pub async fn connect_with_config(config: RedisStoreConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connect_timeout)
            .set_response_timeout(config.response_timeout);
        let connection = ConnectionManager::new_with_config(client, manager_config).await?;

        Ok(Self { connection, config })
    }

    fn counter_key(&self, key: &str) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    fn blocked_ips_key(&self) -> String {
        format!("{}blocked-ips", self.config.key_prefix)
    }
}

#[async_trait]
impl CounterStore for RedisStore {
    async fn increment(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection.clone();
        let value: u64 = conn.incr(self.counter_key(key), 1u64).await?;
        Ok(value)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: bool = conn.expire(self.counter_key(key), ttl_secs as i64).await?;
        Ok(())
    }

    async fn read_count(&self, key: &str) -> Result<u64> {
        let mut conn = self.connection.clone();
        let value: Option<u64> = conn.get(self.counter_key(key)).await?;
        Ok(value.unwrap_or(0))
    }

    async fn block(&self, ip: &str, blocked_at: u64) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.zadd(self.blocked_ips_key(), ip, blocked_at).await?;
        Ok(())
    }

    async fn unblock(&self, ip: &str) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.zrem(self.blocked_ips_key(), ip).await?;
        Ok(())
    }

    async fn is_blocked(&self, ip: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let score: Option<f64> = conn.zscore(self.blocked_ips_key(), ip).await?;
        Ok(score.is_some())
    }

    async fn blocked_ips(&self, max: usize) -> Result<HashSet<String>> {
        if max == 0 {
            return Ok(HashSet::new());
        }

        let mut conn = self.connection.clone();
        let ips: Vec<String> = conn
            .zrevrange(self.blocked_ips_key(), 0, max as isize - 1)
            .await?;
        Ok(ips.into_iter().collect())
    }

    async fn remove_blocks_before(&self, cutoff: u64) -> Result<u64> {
        let mut conn = self.connection.clone();
        let removed: u64 = conn.zrembyscore(self.blocked_ips_key(), 0, cutoff).await?;
        Ok(removed)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1/");
        assert_eq!(config.key_prefix, "isenguard:");
    }

    #[test]
    fn test_config_from_store_section() {
        let config: RedisStoreConfig = StoreConfig {
            url: "redis://cache.internal/".to_string(),
            key_prefix: "guard:".to_string(),
        }
        .into();

        assert_eq!(config.url, "redis://cache.internal/");
        assert_eq!(config.key_prefix, "guard:");
    }
}
