//! Wall-clock abstraction.
//!
//! Window bucketing and block-list retention are both derived from Unix
//! time in whole seconds, so tests substitute a controllable clock.

use std::time::{SystemTime, UNIX_EPOCH};

/// Provides the current wall-clock time in whole seconds since the Unix epoch.
pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds.
    fn unix_seconds(&self) -> u64;
}

/// System clock backed by `SystemTime`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn unix_seconds(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}
