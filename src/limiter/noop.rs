//! No-op limiter used when no shared store is configured.

use async_trait::async_trait;
use std::collections::HashSet;

use super::{LimitReachedCallback, Limiter};
use crate::error::Result;

/// Limiter that never limits and never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLimiter;

impl NoopLimiter {
    /// Create a new no-op limiter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Limiter for NoopLimiter {
    async fn is_ip_blacklisted(&self, _ip: &str) -> Result<bool> {
        Ok(false)
    }

    async fn block(&self, _ip: &str) -> Result<()> {
        Ok(())
    }

    async fn unblock(&self, _ip: &str) -> Result<()> {
        Ok(())
    }

    async fn increase_and_check_limit(
        &self,
        _key: &str,
        _interval_secs: u64,
        _limit: u64,
        _limit_reached_once: Option<LimitReachedCallback>,
    ) -> Result<bool> {
        Ok(false)
    }

    async fn read_call_count(&self, _key: &str) -> Result<u64> {
        Ok(0)
    }

    async fn blocked_ips(&self) -> Result<HashSet<String>> {
        Ok(HashSet::new())
    }

    async fn remove_expired_blocks(&self) -> Result<u64> {
        Ok(0)
    }
}
