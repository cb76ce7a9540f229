use super::{Defaults, Limit};
use crate::cidr::CidrSet;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::Arc;

/// An immutable bundle of every field the decision pipeline reads:
/// whitelist, blacklist, the global limit, the per-route limit map, and
/// the report-only flag. Readers always see a fully-consistent
/// snapshot -- there is no way to observe the whitelist from one sync
/// cycle next to the limit from another (spec §3 invariant).
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    pub whitelist: CidrSet,
    pub blacklist: CidrSet,
    pub global_limit: Limit,
    /// Keyed by the canonical route-key form (see `limit_provider`).
    pub route_limits: HashMap<String, Limit>,
    pub report_only: bool,
}

/// Owns the current `ConfigSnapshot` behind an atomic pointer swap.
/// Readers (`whitelist()`, `blacklist()`, `global_limit()`,
/// `route_limits()`, `report_only()`) take a read of the current `Arc`
/// without blocking the synchronizer, and without the synchronizer
/// blocking them; writers (`swap`) publish a fully-built replacement in
/// one atomic step.
///
/// One invariant the decision engine depends on: a single chain
/// evaluation calls `snapshot()` exactly once and threads that `Arc`
/// through every predicate, so all predicates within one decision see
/// the same snapshot even if a sync happens mid-evaluation.
pub struct ConfStore {
    inner: ArcSwap<ConfigSnapshot>,
}

impl ConfStore {
    /// Seed from caller-supplied defaults. Used before the store is
    /// reachable, or when it never becomes reachable -- the system is
    /// usable from construction.
    pub fn from_defaults(defaults: &Defaults) -> Self {
        let mut route_limits = HashMap::new();
        for entry in &defaults.route_limits {
            let key = crate::limit_provider::canonical_route_key(&entry.path);
            route_limits.insert(key, entry.limit);
        }

        let snapshot = ConfigSnapshot {
            whitelist: CidrSet::from_members(defaults.whitelist.iter().cloned()),
            blacklist: CidrSet::from_members(defaults.blacklist.iter().cloned()),
            global_limit: defaults.global_limit,
            route_limits,
            report_only: defaults.report_only,
        };

        Self {
            inner: ArcSwap::from_pointee(snapshot),
        }
    }

    /// Grab the current snapshot. Callers should take this once per
    /// decision and reuse it, not call it once per predicate.
    pub fn snapshot(&self) -> Arc<ConfigSnapshot> {
        self.inner.load_full()
    }

    /// Atomically publish a freshly built snapshot. Called by the
    /// synchronizer once per sync tick, after the new snapshot is fully
    /// constructed outside any lock.
    pub fn swap(&self, snapshot: ConfigSnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    pub fn report_only(&self) -> bool {
        self.snapshot().report_only
    }

    pub fn global_limit(&self) -> Limit {
        self.snapshot().global_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Duration;

    #[test]
    fn seeds_from_defaults_before_any_sync() {
        let defaults = Defaults {
            whitelist: vec!["10.0.0.0/8".to_string()],
            blacklist: vec!["12.0.0.0/8".to_string()],
            global_limit: Limit::new(20, Duration::from_secs(1)),
            route_limits: vec![],
            report_only: true,
        };

        let store = ConfStore::from_defaults(&defaults);
        let snap = store.snapshot();

        assert!(snap.whitelist.contains("10.1.2.3".parse().unwrap()));
        assert!(snap.blacklist.contains("12.1.2.3".parse().unwrap()));
        assert_eq!(snap.global_limit.count, 20);
        assert!(snap.report_only);
    }

    #[test]
    fn swap_is_visible_to_subsequent_readers() {
        let store = ConfStore::from_defaults(&Defaults::default());
        assert!(!store.report_only());

        let mut next = (*store.snapshot()).clone();
        next.report_only = true;
        store.swap(next);

        assert!(store.report_only());
    }
}
