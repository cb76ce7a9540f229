use crate::config::Limit;
use crate::error::GuardianError;
use crate::request::Request;
use crate::store::{keys, Store};
use std::time::{Duration as StdDuration, SystemTime, UNIX_EPOCH};
use tracing::warn;

/// Outcome of evaluating one limit against one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitDecision {
    pub blocked: bool,
    pub remaining: u32,
    /// True iff this decision took the fail-open path because the
    /// store errored, rather than because the budget allowed it.
    pub error: bool,
}

/// Fixed-window counter over a `Store`. Every `limit.duration` seconds
/// forms a new window; the window a request falls in is
/// `floor(now / duration) * duration`, so all guardian instances
/// sharing a store agree on the window boundary without coordinating
/// clocks beyond ordinary NTP skew (spec §4.2).
pub struct Limiter;

impl Limiter {
    /// `store_key_prefix` namespaces counters from different limit
    /// providers (e.g. global vs. per-route) so they don't collide on
    /// the same client address within the same window.
    pub async fn check(
        store: &dyn Store,
        store_key_prefix: &str,
        client_address: &str,
        limit: Limit,
    ) -> LimitDecision {
        Self::check_at(store, store_key_prefix, client_address, limit, SystemTime::now()).await
    }

    /// Same as `check`, but takes the current time explicitly so tests can
    /// pin bucket boundaries instead of racing the wall clock.
    pub async fn check_at(
        store: &dyn Store,
        store_key_prefix: &str,
        client_address: &str,
        limit: Limit,
        now: SystemTime,
    ) -> LimitDecision {
        if !limit.enabled {
            return LimitDecision {
                blocked: false,
                remaining: u32::MAX,
                error: false,
            };
        }

        let duration = limit.duration.as_std();
        let duration_secs = duration.as_secs().max(1);
        let ttl = StdDuration::from_secs(duration_secs);
        let bucket_start = bucket_start(now, duration_secs);

        let key = format!(
            "{}:{}",
            store_key_prefix,
            keys::counter_key(client_address, bucket_start)
        );

        match store.incr(&key, 1, ttl).await {
            Ok(count) => {
                let blocked = count > limit.count;
                let remaining = limit.count.saturating_sub(count).min(u32::MAX as u64) as u32;
                LimitDecision { blocked, remaining, error: false }
            }
            Err(e) => {
                // Fail-open: a store outage must not turn into a blanket
                // denial (spec §9 open question resolution).
                let err = GuardianError::from(e);
                warn!(error = %err, fail_open = err.fail_open(), "rate limit store error, failing open");
                LimitDecision {
                    blocked: false,
                    remaining: u32::MAX,
                    error: true,
                }
            }
        }
    }
}

/// `floor(now/duration)*duration`, in epoch seconds -- the window a
/// request at `now` falls into (spec §4.2).
fn bucket_start(now: SystemTime, duration_secs: u64) -> u64 {
    let now_secs = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    (now_secs / duration_secs) * duration_secs
}

/// Builds the namespace string a `LimitProvider` passes to `Limiter::check`
/// so global and per-route counters never collide.
pub fn namespace_for(provider_name: &str, req: &Request) -> String {
    format!("{}:{}", provider_name, req.path)
}
