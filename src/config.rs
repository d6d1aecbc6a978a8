//! Configuration management for Isenguard.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Main configuration for the Isenguard service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IsenguardConfig {
    /// Which limiter backend is active process-wide
    #[serde(default)]
    pub limiter: LimiterStrategy,

    /// Connection settings for the shared counter store
    #[serde(default)]
    pub store: Option<StoreConfig>,

    /// Rate-limit realms keyed by name
    #[serde(default)]
    pub realms: HashMap<String, RealmConfig>,
}

/// Selects which limiter backend is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimiterStrategy {
    /// Never limit, never block.
    Disabled,
    /// Count and block against the shared store; fail at startup without one.
    Store,
    /// Use the shared store when it is configured and reachable, otherwise
    /// behave like `Disabled`.
    Auto,
}

impl Default for LimiterStrategy {
    fn default() -> Self {
        LimiterStrategy::Auto
    }
}

/// Connection settings for the shared counter store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store connection URL, e.g. "redis://127.0.0.1/"
    pub url: String,

    /// Prefix applied to every key written by this service
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "isenguard:".to_string()
}

/// Configuration of a single rate-limit realm.
///
/// A realm with `limit == 0` or `interval == 0` is not limited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealmConfig {
    /// Maximum calls per window
    #[serde(default)]
    pub limit: u64,

    /// Window length. Accepts plain seconds (`90`) or a suffixed duration
    /// string (`"90s"`, `"2m"`, `"1h"`, `"1d"`), stored as whole seconds.
    #[serde(default, deserialize_with = "deserialize_interval")]
    pub interval: u64,

    /// Free-form grouping tag, conventionally "ip", "tenant" or "user"
    #[serde(default, rename = "type")]
    pub realm_type: Option<String>,
}

impl IsenguardConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| crate::error::IsenguardError::Config(e.to_string()))
    }
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    struct IntervalVisitor;

    impl<'de> Visitor<'de> for IntervalVisitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("seconds or a duration string like \"90s\", \"2m\", \"1h\", \"1d\"")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value)
                .map_err(|_| E::custom(format!("interval must not be negative: {}", value)))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
            parse_interval(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(IntervalVisitor)
}

/// Parses an interval into whole seconds.
fn parse_interval(value: &str) -> Result<u64, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("interval must not be empty".to_string());
    }

    if let Ok(seconds) = value.parse::<u64>() {
        return Ok(seconds);
    }

    let (amount, unit) = value.split_at(value.len() - 1);
    let amount: u64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("invalid interval '{}'", value))?;

    match unit {
        "s" => Ok(amount),
        "m" => Ok(amount * 60),
        "h" => Ok(amount * 3600),
        "d" => Ok(amount * 86400),
        _ => Err(format!("unknown interval unit '{}' in '{}'", unit, value)),
    }
}
