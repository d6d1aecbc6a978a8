//! Store-backed limiter.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use super::{LimitReachedCallback, Limiter, MAX_BLOCKED_IPS, MAX_BLOCK_DURATION};
use crate::clock::Clock;
use crate::error::Result;
use crate::store::CounterStore;

/// Limiter implementing the counting and blocking logic against a shared
/// [`CounterStore`].
pub struct StoreLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl StoreLimiter {
    /// Create a new store-backed limiter.
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub(crate) fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }
}

#[async_trait]
impl Limiter for StoreLimiter {
    async fn is_ip_blacklisted(&self, ip: &str) -> Result<bool> {
        self.store.is_blocked(ip).await
    }

    async fn block(&self, ip: &str) -> Result<()> {
        self.store.block(ip, self.clock.unix_seconds()).await
    }

    async fn unblock(&self, ip: &str) -> Result<()> {
        self.store.unblock(ip).await
    }

    async fn increase_and_check_limit(
        &self,
        key: &str,
        interval_secs: u64,
        limit: u64,
        limit_reached_once: Option<LimitReachedCallback>,
    ) -> Result<bool> {
        let value = self.store.increment(key).await?;

        if value == 1 {
            // A value of 1 means the bucket was just created; its TTL is the
            // window length. Two racing first increments may both take this
            // branch and set the same TTL twice.
            self.store.expire(key, interval_secs).await?;
        }

        if value == limit {
            if let Some(callback) = limit_reached_once {
                callback();
            }
        }

        Ok(value >= limit)
    }

    async fn read_call_count(&self, key: &str) -> Result<u64> {
        self.store.read_count(key).await
    }

    async fn blocked_ips(&self) -> Result<HashSet<String>> {
        self.store.blocked_ips(MAX_BLOCKED_IPS).await
    }

    async fn remove_expired_blocks(&self) -> Result<u64> {
        let cutoff = self
            .clock
            .unix_seconds()
            .saturating_sub(MAX_BLOCK_DURATION.as_secs());
        self.store.remove_blocks_before(cutoff).await
    }
}
