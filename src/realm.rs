//! Realm limit resolution and caching.

use dashmap::DashMap;
use std::collections::HashMap;
use tracing::warn;

use crate::config::RealmConfig;

/// The limit applied to a single realm: a maximum number of calls within a
/// fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    /// Maximum calls per window
    pub max_calls: u64,
    /// Window length in seconds
    pub interval_secs: u64,
}

impl Limit {
    /// The limit of an unlimited realm.
    pub const DISABLED: Limit = Limit {
        max_calls: 0,
        interval_secs: 0,
    };

    /// A zero maximum or a zero interval disables limiting for the realm.
    pub fn is_enabled(&self) -> bool {
        self.max_calls > 0 && self.interval_secs > 0
    }

    /// Formats the limit as "N calls within Ms".
    pub fn format(&self) -> String {
        format!("{} calls within {}s", self.max_calls, self.interval_secs)
    }

    /// Formats a counter value against the limit as "current / N (per Ms)".
    pub fn format_current(&self, current: u64) -> String {
        format!(
            "{} / {} (per {}s)",
            current, self.max_calls, self.interval_secs
        )
    }
}

/// Resolves and caches the configured limit per realm name.
///
/// A realm is read from the configuration table on first access and the
/// resolved pair is kept for the remainder of the process's life; there is
/// no invalidation path. Explicit override limits are applied per call and
/// never enter the cache.
pub struct RealmLimitCache {
    realms: HashMap<String, RealmConfig>,
    cache: DashMap<String, Limit>,
}

impl RealmLimitCache {
    /// Create a cache over the given realm table.
    pub fn new(realms: HashMap<String, RealmConfig>) -> Self {
        Self {
            realms,
            cache: DashMap::new(),
        }
    }

    /// Resolves the configured limit for a realm. Unknown realms resolve to
    /// a disabled limit.
    pub fn resolve(&self, realm: &str) -> Limit {
        if let Some(limit) = self.cache.get(realm) {
            return *limit;
        }

        *self
            .cache
            .entry(realm.to_string())
            .or_insert_with(|| self.load(realm))
    }

    fn load(&self, realm: &str) -> Limit {
        match self.realms.get(realm) {
            Some(config) => Limit {
                max_calls: config.limit,
                interval_secs: config.interval,
            },
            None => {
                warn!(realm = %realm, "No limit configured for realm, it will not be limited");
                Limit::DISABLED
            }
        }
    }

    /// Resolves the effective limit for a call, replacing the configured
    /// maximum with an explicit override while keeping the configured
    /// interval.
    pub fn fetch(&self, realm: &str, explicit_limit: Option<u64>) -> Limit {
        let configured = self.resolve(realm);
        match explicit_limit {
            Some(max_calls) => Limit {
                max_calls,
                interval_secs: configured.interval_secs,
            },
            None => configured,
        }
    }

    /// Lists all realm names tagged with the given type.
    pub fn realms_by_type(&self, realm_type: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .realms
            .iter()
            .filter(|(_, config)| config.realm_type.as_deref() == Some(realm_type))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm(limit: u64, interval: u64, realm_type: Option<&str>) -> RealmConfig {
        RealmConfig {
            limit,
            interval,
            realm_type: realm_type.map(str::to_string),
        }
    }

    fn cache() -> RealmLimitCache {
        let mut realms = HashMap::new();
        realms.insert("login".to_string(), realm(5, 60, Some("ip")));
        realms.insert("api".to_string(), realm(100, 3600, Some("tenant")));
        realms.insert("exports".to_string(), realm(10, 300, Some("tenant")));
        realms.insert("unlimited".to_string(), realm(0, 0, None));
        RealmLimitCache::new(realms)
    }

    #[test]
    fn test_limit_validity() {
        assert!(Limit {
            max_calls: 5,
            interval_secs: 60
        }
        .is_enabled());
        assert!(!Limit {
            max_calls: 0,
            interval_secs: 60
        }
        .is_enabled());
        assert!(!Limit {
            max_calls: 5,
            interval_secs: 0
        }
        .is_enabled());
        assert!(!Limit::DISABLED.is_enabled());
    }

    #[test]
    fn test_limit_formatting() {
        let limit = Limit {
            max_calls: 5,
            interval_secs: 60,
        };
        assert_eq!(limit.format(), "5 calls within 60s");
        assert_eq!(limit.format_current(2), "2 / 5 (per 60s)");
    }

    #[test]
    fn test_resolve_reads_configuration() {
        let cache = cache();
        let limit = cache.resolve("login");

        assert_eq!(limit.max_calls, 5);
        assert_eq!(limit.interval_secs, 60);
    }

    #[test]
    fn test_unknown_realm_is_disabled() {
        let cache = cache();
        assert!(!cache.resolve("no-such-realm").is_enabled());
    }

    #[test]
    fn test_explicit_override_replaces_limit_but_keeps_interval() {
        let cache = cache();

        let overridden = cache.fetch("login", Some(2));
        assert_eq!(overridden.max_calls, 2);
        assert_eq!(overridden.interval_secs, 60);

        // The override is per call and must not stick.
        let configured = cache.fetch("login", None);
        assert_eq!(configured.max_calls, 5);
    }

    #[test]
    fn test_realms_by_type() {
        let cache = cache();

        assert_eq!(cache.realms_by_type("ip"), vec!["login"]);
        assert_eq!(cache.realms_by_type("tenant"), vec!["api", "exports"]);
        assert!(cache.realms_by_type("user").is_empty());
    }
}
