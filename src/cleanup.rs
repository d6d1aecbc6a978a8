//! Periodic cleanup of stale block-list entries.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::limiter::Limiter;

/// How often the cleanup task runs.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns the background task that purges block-list entries older than the
/// retention window.
///
/// A failed pass is logged and the next tick proceeds normally. With the
/// no-op limiter active every pass removes nothing.
pub fn spawn_block_list_cleanup(limiter: Arc<dyn Limiter>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            run_cleanup_pass(limiter.as_ref()).await;
        }
    })
}

/// Runs a single cleanup pass and returns the number of removed entries.
pub async fn run_cleanup_pass(limiter: &dyn Limiter) -> u64 {
    match limiter.remove_expired_blocks().await {
        Ok(0) => {
            debug!("Block-list cleanup removed no entries");
            0
        }
        Ok(removed) => {
            info!(removed = removed, "Removed stale block-list entries");
            removed
        }
        Err(error) => {
            warn!(error = %error, "Block-list cleanup failed, will retry on the next tick");
            0
        }
    }
}
