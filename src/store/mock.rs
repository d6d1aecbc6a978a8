//! In-memory counter store used by unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::CounterStore;
use crate::error::{IsenguardError, Result};

/// In-memory [`CounterStore`] with a switchable failure mode to simulate a
/// store outage.
///
/// Counters never expire on their own; tests that roll the window rely on
/// the bucket key changing, exactly as production does.
#[derive(Default)]
pub(crate) struct MockStore {
    counters: Mutex<HashMap<String, u64>>,
    ttls: Mutex<HashMap<String, u64>>,
    blocked: Mutex<HashMap<String, u64>>,
    expire_calls: AtomicUsize,
    unavailable: AtomicBool,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// All subsequent operations fail until this is reset.
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn ttl_of(&self, key: &str) -> Option<u64> {
        self.ttls.lock().get(key).copied()
    }

    pub(crate) fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn blocked_at(&self, ip: &str) -> Option<u64> {
        self.blocked.lock().get(ip).copied()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IsenguardError::Store(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "simulated store outage",
            ))));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MockStore {
    async fn increment(&self, key: &str) -> Result<u64> {
        self.check_available()?;
        let mut counters = self.counters.lock();
        let value = counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> Result<()> {
        self.check_available()?;
        self.expire_calls.fetch_add(1, Ordering::SeqCst);
        self.ttls.lock().insert(key.to_string(), ttl_secs);
        Ok(())
    }

    async fn read_count(&self, key: &str) -> Result<u64> {
        self.check_available()?;
        Ok(self.counters.lock().get(key).copied().unwrap_or(0))
    }

    async fn block(&self, ip: &str, blocked_at: u64) -> Result<()> {
        self.check_available()?;
        self.blocked.lock().insert(ip.to_string(), blocked_at);
        Ok(())
    }

    async fn unblock(&self, ip: &str) -> Result<()> {
        self.check_available()?;
        self.blocked.lock().remove(ip);
        Ok(())
    }

    async fn is_blocked(&self, ip: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self.blocked.lock().contains_key(ip))
    }

    async fn blocked_ips(&self, max: usize) -> Result<HashSet<String>> {
        self.check_available()?;
        let blocked = self.blocked.lock();
        let mut entries: Vec<(&String, &u64)> = blocked.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1));
        Ok(entries
            .into_iter()
            .take(max)
            .map(|(ip, _)| ip.clone())
            .collect())
    }

    async fn remove_blocks_before(&self, cutoff: u64) -> Result<u64> {
        self.check_available()?;
        let mut blocked = self.blocked.lock();
        let before = blocked.len();
        blocked.retain(|_, blocked_at| *blocked_at > cutoff);
        Ok((before - blocked.len()) as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
