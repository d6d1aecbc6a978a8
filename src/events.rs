//! Collaborator boundaries for audit logging and analytics events.
//!
//! Isenguard never persists incidents itself; it hands them to whatever
//! sinks the embedding application provides. The no-op implementations let
//! the facade stand alone.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Maximum number of characters kept of an incident location.
pub const MAX_LOCATION_LENGTH: usize = 255;

/// Immutable incident context captured once, when a limit is first breached
/// within a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitingInfo {
    /// IP address of the caller, if known
    pub ip: Option<String>,
    /// Tenant id of the caller, if known
    pub tenant_id: Option<String>,
    /// Human-readable location of the incident, e.g. a request URI
    pub location: Option<String>,
}

impl RateLimitingInfo {
    /// Create an incident context from its parts.
    pub fn new(ip: Option<String>, tenant_id: Option<String>, location: Option<String>) -> Self {
        Self {
            ip,
            tenant_id,
            location,
        }
    }

    /// An incident context with no known data.
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Recorded once per breached window.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitTriggeredEvent {
    /// Unique event id
    pub id: Uuid,
    /// When the breach was detected
    pub timestamp: DateTime<Utc>,
    /// The realm whose limit was breached
    pub realm: String,
    /// The scope that breached it
    pub scope: String,
    /// The effective limit
    pub limit: u64,
    /// The window length in seconds
    pub interval_secs: u64,
    /// IP address from the incident context
    pub ip: Option<String>,
    /// Tenant id from the incident context
    pub tenant: Option<String>,
    /// Incident location, capped at [`MAX_LOCATION_LENGTH`] characters
    pub location: Option<String>,
}

impl RateLimitTriggeredEvent {
    /// Capture a new event, truncating overlong locations.
    pub fn new(
        realm: impl Into<String>,
        scope: impl Into<String>,
        limit: u64,
        interval_secs: u64,
        info: RateLimitingInfo,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            realm: realm.into(),
            scope: scope.into(),
            limit,
            interval_secs,
            ip: info.ip,
            tenant: info.tenant_id,
            location: info
                .location
                .map(|location| truncate(location, MAX_LOCATION_LENGTH)),
        }
    }
}

/// Recorded for every explicit block of an IP address.
#[derive(Debug, Clone, Serialize)]
pub struct IpBlockedEvent {
    /// Unique event id
    pub id: Uuid,
    /// When the address was blocked
    pub timestamp: DateTime<Utc>,
    /// The blocked address
    pub ip: String,
}

impl IpBlockedEvent {
    /// Capture a new event for the given address.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            ip: ip.into(),
        }
    }
}

/// Sink for negative audit entries attributed to the current actor.
pub trait AuditLog: Send + Sync {
    /// Writes a negative audit entry, e.g. "Isenguard.limitReached".
    fn negative(&self, message: &str);
}

/// Sink for structured analytics events.
pub trait EventRecorder: Send + Sync {
    /// Receives one event per breached window.
    fn record_rate_limit_triggered(&self, event: RateLimitTriggeredEvent);

    /// Receives one event per explicit IP block.
    fn record_ip_blocked(&self, event: IpBlockedEvent);
}

/// Audit log that drops all entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditLog;

impl AuditLog for NoopAuditLog {
    fn negative(&self, _message: &str) {}
}

/// Event recorder that drops all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventRecorder;

impl EventRecorder for NoopEventRecorder {
    fn record_rate_limit_triggered(&self, _event: RateLimitTriggeredEvent) {}

    fn record_ip_blocked(&self, _event: IpBlockedEvent) {}
}

fn truncate(value: String, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value
    } else {
        value.chars().take(max_chars).collect()
    }
}
