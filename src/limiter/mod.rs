//! Limiter backends and the contract they share.

mod auto;
mod noop;
mod store_backed;

pub use auto::AutodetectLimiter;
pub use noop::NoopLimiter;
pub use store_backed::StoreLimiter;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::config::{IsenguardConfig, LimiterStrategy};
use crate::error::{IsenguardError, Result};
use crate::store::RedisStore;

/// Upper bound on the number of addresses reported by [`Limiter::blocked_ips`].
pub const MAX_BLOCKED_IPS: usize = 50;

/// How long a blocked IP stays on the block list before cleanup removes it.
pub const MAX_BLOCK_DURATION: Duration = Duration::from_secs(600);

/// Callback fired the first time a limit is reached within a window.
pub type LimitReachedCallback = Box<dyn FnOnce() + Send>;

/// Contract shared by all limiter backends.
///
/// Counting is fixed-window: a key identifies one scope+realm+window bucket
/// and the backend only ever increments it atomically.
#[async_trait]
pub trait Limiter: Send + Sync {
    /// Determines whether the given address is on the block list.
    async fn is_ip_blacklisted(&self, ip: &str) -> Result<bool>;

    /// Adds the given address to the block list. Re-blocking an already
    /// blocked address refreshes its timestamp.
    async fn block(&self, ip: &str) -> Result<()>;

    /// Removes the given address from the block list.
    async fn unblock(&self, ip: &str) -> Result<()>;

    /// Atomically increments the bucket under `key` and compares it to
    /// `limit`. Invokes `limit_reached_once` exactly when the post-increment
    /// count equals `limit`; returns `true` whenever the count is at or
    /// beyond the limit.
    async fn increase_and_check_limit(
        &self,
        key: &str,
        interval_secs: u64,
        limit: u64,
        limit_reached_once: Option<LimitReachedCallback>,
    ) -> Result<bool>;

    /// Reads the bucket under `key` without counting a call, 0 if absent.
    async fn read_call_count(&self, key: &str) -> Result<u64>;

    /// Returns the most recently blocked addresses, bounded to
    /// [`MAX_BLOCKED_IPS`].
    async fn blocked_ips(&self) -> Result<HashSet<String>>;

    /// Removes block-list entries older than [`MAX_BLOCK_DURATION`] and
    /// returns how many were removed.
    async fn remove_expired_blocks(&self) -> Result<u64>;
}

/// Builds the limiter selected by the configuration.
///
/// `disabled` always yields the no-op backend. `store` requires a store
/// section and fails without one. `auto` uses the store when one is
/// configured and reachable and the no-op backend otherwise.
pub async fn build_limiter(config: &IsenguardConfig) -> Result<Arc<dyn Limiter>> {
    match config.limiter {
        LimiterStrategy::Disabled => {
            info!("Rate limiting is disabled");
            Ok(Arc::new(NoopLimiter::new()))
        }
        LimiterStrategy::Store => {
            let store_config = config.store.clone().ok_or_else(|| {
                IsenguardError::Config(
                    "Limiter strategy 'store' requires a store section".to_string(),
                )
            })?;
            let store = RedisStore::connect_with_config(store_config.into()).await?;
            Ok(Arc::new(StoreLimiter::new(
                Arc::new(store),
                Arc::new(SystemClock::new()),
            )))
        }
        LimiterStrategy::Auto => match config.store.clone() {
            None => {
                info!("No store configured, rate limiting is disabled");
                Ok(Arc::new(NoopLimiter::new()))
            }
            Some(store_config) => {
                match RedisStore::connect_with_config(store_config.into()).await {
                    Ok(store) => Ok(Arc::new(AutodetectLimiter::new(StoreLimiter::new(
                        Arc::new(store),
                        Arc::new(SystemClock::new()),
                    )))),
                    Err(error) => {
                        warn!(error = %error, "Store is unreachable, rate limiting is disabled");
                        Ok(Arc::new(NoopLimiter::new()))
                    }
                }
            }
        },
    }
}
