//! Limiter that selects between the store-backed and no-op backends.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::OnceCell;
use tracing::warn;

use super::{LimitReachedCallback, Limiter, NoopLimiter, StoreLimiter};
use crate::error::Result;

/// Limiter that probes store availability once and delegates every call to
/// either the store-backed or the no-op backend.
///
/// The probe result is cached for the process lifetime and never retried; a
/// store that only becomes reachable later is not adopted.
pub struct AutodetectLimiter {
    store_backed: StoreLimiter,
    fallback: NoopLimiter,
    store_available: OnceCell<bool>,
}

impl AutodetectLimiter {
    /// Create an auto-selecting limiter around the given store-backed one.
    pub fn new(store_backed: StoreLimiter) -> Self {
        Self {
            store_backed,
            fallback: NoopLimiter::new(),
            store_available: OnceCell::new(),
        }
    }

    async fn active(&self) -> &dyn Limiter {
        let available = self
            .store_available
            .get_or_init(|| async {
                match self.store_backed.store().ping().await {
                    Ok(()) => true,
                    Err(error) => {
                        warn!(error = %error, "Store is unreachable, falling back to the no-op limiter");
                        false
                    }
                }
            })
            .await;

        if *available {
            &self.store_backed
        } else {
            &self.fallback
        }
    }
}

#[async_trait]
impl Limiter for AutodetectLimiter {
    async fn is_ip_blacklisted(&self, ip: &str) -> Result<bool> {
        self.active().await.is_ip_blacklisted(ip).await
    }

    async fn block(&self, ip: &str) -> Result<()> {
        self.active().await.block(ip).await
    }

    async fn unblock(&self, ip: &str) -> Result<()> {
        self.active().await.unblock(ip).await
    }

    async fn increase_and_check_limit(
        &self,
        key: &str,
        interval_secs: u64,
        limit: u64,
        limit_reached_once: Option<LimitReachedCallback>,
    ) -> Result<bool> {
        self.active()
            .await
            .increase_and_check_limit(key, interval_secs, limit, limit_reached_once)
            .await
    }

    async fn read_call_count(&self, key: &str) -> Result<u64> {
        self.active().await.read_call_count(key).await
    }

    async fn blocked_ips(&self) -> Result<HashSet<String>> {
        self.active().await.blocked_ips().await
    }

    async fn remove_expired_blocks(&self) -> Result<u64> {
        self.active().await.remove_expired_blocks().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::mock::MockClock;
    use crate::clock::Clock;
    use crate::store::mock::MockStore;
    use crate::store::CounterStore;
    use std::sync::Arc;

    fn auto_limiter() -> (AutodetectLimiter, Arc<MockStore>) {
        let store = Arc::new(MockStore::new());
        let store_backed = StoreLimiter::new(
            store.clone() as Arc<dyn CounterStore>,
            Arc::new(MockClock::at(1_200_000)) as Arc<dyn Clock>,
        );
        (AutodetectLimiter::new(store_backed), store)
    }

    #[tokio::test]
    async fn test_reachable_store_is_used() {
        let (limiter, _) = auto_limiter();

        for _ in 0..2 {
            limiter
                .increase_and_check_limit("key", 60, 3, None)
                .await
                .unwrap();
        }

        assert_eq!(limiter.read_call_count("key").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_store_falls_back_to_noop() {
        let (limiter, store) = auto_limiter();
        store.set_unavailable(true);

        let reached = limiter
            .increase_and_check_limit("key", 60, 1, None)
            .await
            .unwrap();

        assert!(!reached);
        assert!(!limiter.is_ip_blacklisted("203.0.113.7").await.unwrap());
    }

    #[tokio::test]
    async fn test_probe_is_never_retried() {
        let (limiter, store) = auto_limiter();

        store.set_unavailable(true);
        limiter
            .increase_and_check_limit("key", 60, 1, None)
            .await
            .unwrap();

        // The store recovers, but the cached decision stands.
        store.set_unavailable(false);
        for _ in 0..3 {
            let reached = limiter
                .increase_and_check_limit("key", 60, 1, None)
                .await
                .unwrap();
            assert!(!reached);
        }
        assert_eq!(limiter.read_call_count("key").await.unwrap(), 0);
    }
}
