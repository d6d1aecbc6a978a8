//! The Isenguard facade: rate-limit checks, enforcement and IP blocking.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::{IsenguardError, Result};
use crate::events::{
    AuditLog, EventRecorder, IpBlockedEvent, NoopAuditLog, NoopEventRecorder,
    RateLimitTriggeredEvent, RateLimitingInfo,
};
use crate::limiter::{LimitReachedCallback, Limiter};
use crate::realm::{Limit, RealmLimitCache};

/// Type tag for realms limited by the calling IP.
pub const REALM_TYPE_IP: &str = "ip";

/// Type tag for realms limited by the calling tenant id.
pub const REALM_TYPE_TENANT: &str = "tenant";

/// Type tag for realms limited by the calling user id.
pub const REALM_TYPE_USER: &str = "user";

/// Rate limiting and IP block-list facade.
///
/// All mutable state lives in the limiter's shared store; this type only
/// holds the immutable realm-limit cache and the collaborator handles, so
/// it is freely shared across request-handling tasks.
pub struct Isenguard {
    limiter: Arc<dyn Limiter>,
    realms: RealmLimitCache,
    clock: Arc<dyn Clock>,
    audit_log: Arc<dyn AuditLog>,
    events: Arc<dyn EventRecorder>,
}

impl Isenguard {
    /// Creates a facade over the given limiter and realm table. The audit
    /// and event sinks default to no-ops, the clock to the system clock.
    pub fn new(limiter: Arc<dyn Limiter>, realms: RealmLimitCache) -> Self {
        Self {
            limiter,
            realms,
            clock: Arc::new(SystemClock::new()),
            audit_log: Arc::new(NoopAuditLog),
            events: Arc::new(NoopEventRecorder),
        }
    }

    /// Replaces the audit log sink.
    pub fn with_audit_log(mut self, audit_log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = audit_log;
        self
    }

    /// Replaces the event recorder.
    pub fn with_event_recorder(mut self, events: Arc<dyn EventRecorder>) -> Self {
        self.events = events;
        self
    }

    /// Replaces the clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a call for the given scope and determines whether the
    /// realm's rate limit is reached.
    ///
    /// Invoking this counts towards the limit; use
    /// [`Self::check_rate_limit_reached`] for a side-effect-free check. The
    /// info supplier runs at most once, when the limit is first reached
    /// within the current window, and feeds the audit-log entry and the
    /// recorded incident.
    pub async fn is_rate_limit_reached<F>(
        &self,
        scope: &str,
        realm: &str,
        explicit_limit: Option<u64>,
        info_supplier: F,
    ) -> bool
    where
        F: FnOnce() -> RateLimitingInfo + Send + 'static,
    {
        self.is_rate_limit_reached_with_callback(scope, realm, explicit_limit, None, info_supplier)
            .await
    }

    /// Like [`Self::is_rate_limit_reached`], with an extra action that runs
    /// once when the limit is first reached in the current window, after
    /// the built-in side effects.
    pub async fn is_rate_limit_reached_with_callback<F>(
        &self,
        scope: &str,
        realm: &str,
        explicit_limit: Option<u64>,
        limit_reached_once: Option<LimitReachedCallback>,
        info_supplier: F,
    ) -> bool
    where
        F: FnOnce() -> RateLimitingInfo + Send + 'static,
    {
        let result = self
            .register_call(scope, realm, explicit_limit, limit_reached_once, info_supplier)
            .await;
        Self::fail_open(result, "is_rate_limit_reached")
    }

    async fn register_call<F>(
        &self,
        scope: &str,
        realm: &str,
        explicit_limit: Option<u64>,
        limit_reached_once: Option<LimitReachedCallback>,
        info_supplier: F,
    ) -> Result<bool>
    where
        F: FnOnce() -> RateLimitingInfo + Send + 'static,
    {
        let limit = self.realms.fetch(realm, explicit_limit);
        if !limit.is_enabled() {
            return Ok(false);
        }

        let key = self.bucket_key(scope, realm, limit.interval_secs);
        let on_first_breach =
            self.first_breach_callback(scope, realm, limit, limit_reached_once, info_supplier);

        // The full allowance may be used up; the limit counts as reached
        // from the first call beyond it.
        self.limiter
            .increase_and_check_limit(
                &key,
                limit.interval_secs,
                limit.max_calls.saturating_add(1),
                Some(on_first_breach),
            )
            .await
    }

    fn first_breach_callback<F>(
        &self,
        scope: &str,
        realm: &str,
        limit: Limit,
        limit_reached_once: Option<LimitReachedCallback>,
        info_supplier: F,
    ) -> LimitReachedCallback
    where
        F: FnOnce() -> RateLimitingInfo + Send + 'static,
    {
        let scope = scope.to_owned();
        let realm = realm.to_owned();
        let audit_log = Arc::clone(&self.audit_log);
        let events = Arc::clone(&self.events);

        Box::new(move || {
            let info = info_supplier();

            warn!(
                scope = %scope,
                realm = %realm,
                limit = %limit.format(),
                ip = info.ip.as_deref().unwrap_or("-"),
                tenant = info.tenant_id.as_deref().unwrap_or("-"),
                location = info.location.as_deref().unwrap_or("-"),
                "Scope reached its rate limit"
            );

            audit_log.negative("Isenguard.limitReached");

            events.record_rate_limit_triggered(RateLimitTriggeredEvent::new(
                realm,
                scope,
                limit.max_calls,
                limit.interval_secs,
                info,
            ));

            if let Some(callback) = limit_reached_once {
                callback();
            }
        })
    }

    /// Determines whether the rate limit is currently reached without
    /// counting a call and without side effects.
    pub async fn check_rate_limit_reached(
        &self,
        scope: &str,
        realm: &str,
        explicit_limit: Option<u64>,
    ) -> bool {
        let limit = self.realms.fetch(realm, explicit_limit);
        if !limit.is_enabled() {
            return false;
        }

        let key = self.bucket_key(scope, realm, limit.interval_secs);
        let result = self
            .limiter
            .read_call_count(&key)
            .await
            .map(|count| count >= limit.max_calls);
        Self::fail_open(result, "check_rate_limit_reached")
    }

    /// Enforces the rate limit for the given scope and realm: counts the
    /// call and fails with [`IsenguardError::LimitReached`] once the limit
    /// is hit.
    pub async fn enforce_rate_limiting<F>(
        &self,
        scope: &str,
        realm: &str,
        explicit_limit: Option<u64>,
        info_supplier: F,
    ) -> Result<()>
    where
        F: FnOnce() -> RateLimitingInfo + Send + 'static,
    {
        if self
            .is_rate_limit_reached(scope, realm, explicit_limit, info_supplier)
            .await
        {
            let limit = self.realms.fetch(realm, explicit_limit);
            return Err(IsenguardError::LimitReached {
                realm: realm.to_owned(),
                limit: limit.format(),
            });
        }

        Ok(())
    }

    /// Reports the current usage of the given scope against the realm's
    /// limit as "current / limit (per Nsecs)", or `None` when the realm is
    /// not limited.
    pub async fn rate_limit_info(
        &self,
        scope: &str,
        realm: &str,
        explicit_limit: Option<u64>,
    ) -> Result<Option<String>> {
        let limit = self.realms.fetch(realm, explicit_limit);
        if !limit.is_enabled() {
            return Ok(None);
        }

        let key = self.bucket_key(scope, realm, limit.interval_secs);
        let current = self.limiter.read_call_count(&key).await?;
        Ok(Some(limit.format_current(current)))
    }

    /// Determines whether the given address has been blocked via
    /// [`Self::block_ip`].
    pub async fn is_ip_blacklisted(&self, ip: &str) -> bool {
        Self::fail_open(self.limiter.is_ip_blacklisted(ip).await, "is_ip_blacklisted")
    }

    /// Adds the given address to the block list and records an event for it.
    pub async fn block_ip(&self, ip: &str) -> Result<()> {
        warn!(ip = %ip, "Adding IP to the list of blocked addresses");
        self.limiter.block(ip).await?;
        self.events.record_ip_blocked(IpBlockedEvent::new(ip));
        Ok(())
    }

    /// Removes the given address from the block list.
    pub async fn unblock_ip(&self, ip: &str) -> Result<()> {
        warn!(ip = %ip, "Removing IP from the list of blocked addresses");
        self.limiter.unblock(ip).await
    }

    /// Returns the currently blocked addresses, bounded to the most
    /// recently blocked entries.
    pub async fn blocked_ips(&self) -> Result<HashSet<String>> {
        self.limiter.blocked_ips().await
    }

    /// Lists all realm names tagged with the given type, e.g.
    /// [`REALM_TYPE_IP`].
    pub fn realms_by_type(&self, realm_type: &str) -> Vec<String> {
        self.realms.realms_by_type(realm_type)
    }

    fn bucket_key(&self, scope: &str, realm: &str, interval_secs: u64) -> String {
        let current_interval = self.clock.unix_seconds() / interval_secs;
        format!("{}-{}-{}", scope, realm, current_interval)
    }

    /// Backend failures are reported as "not limited" / "not blacklisted":
    /// refusing all traffic while the store is down would take the whole
    /// application offline, which is worse than briefly running without
    /// protection.
    fn fail_open(result: Result<bool>, operation: &'static str) -> bool {
        match result {
            Ok(value) => value,
            Err(err) => {
                error!(error = %err, operation, "Backend call failed, failing open");
                false
            }
        }
    }
}
