use super::{ConfStore, ConfigSnapshot, Limit};
use crate::cidr::CidrSet;
use crate::error::GuardianError;
use crate::store::{keys, Store};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Runs the periodic synchronizer: every `interval`, fetch whitelist,
/// blacklist, global limit, route limits, and report-only from the
/// store, build a new snapshot, and swap it in. Exits within one
/// interval of `shutdown` firing.
///
/// Individual field fetch errors degrade that one field to its previous
/// value -- a half-readable store never blocks the other fields, and a
/// half-built snapshot is never published (spec §4.4).
pub fn spawn(
    conf_store: Arc<ConfStore>,
    store: Arc<dyn Store>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        // First tick fires immediately; skip it so we don't double-sync
        // right after the initial defaults-backed construction.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sync_once(&conf_store, store.as_ref()).await;
                }
                _ = shutdown.recv() => {
                    debug!("config synchronizer shutting down");
                    break;
                }
            }
        }
    })
}

async fn sync_once(conf_store: &ConfStore, store: &dyn Store) {
    let previous = conf_store.snapshot();

    let whitelist = fetch_cidr_set(store, keys::WHITELIST_SET, &previous.whitelist).await;
    let blacklist = fetch_cidr_set(store, keys::BLACKLIST_SET, &previous.blacklist).await;
    let global_limit = fetch_global_limit(store, previous.global_limit).await;
    let route_limits = fetch_route_limits(store, &previous.route_limits).await;
    let report_only = fetch_report_only(store, previous.report_only).await;

    conf_store.swap(ConfigSnapshot {
        whitelist,
        blacklist,
        global_limit,
        route_limits,
        report_only,
    });

    debug!("config snapshot refreshed");
}

async fn fetch_cidr_set(store: &dyn Store, set_name: &str, previous: &CidrSet) -> CidrSet {
    match store.smembers(set_name).await {
        Ok(members) => CidrSet::from_members(members),
        Err(e) => {
            warn!(set = set_name, error = %e, "failed to sync set, keeping previous value");
            previous.clone()
        }
    }
}

async fn fetch_global_limit(store: &dyn Store, previous: Limit) -> Limit {
    match store.get(keys::GLOBAL_LIMIT).await {
        Ok(Some(raw)) => match serde_json::from_str::<Limit>(&raw) {
            Ok(limit) => limit,
            Err(e) => {
                let err = GuardianError::ConfigParse(e.to_string());
                warn!(error = %err, "malformed global limit in store, keeping previous value");
                previous
            }
        },
        Ok(None) => previous,
        Err(e) => {
            warn!(error = %e, "failed to sync global limit, keeping previous value");
            previous
        }
    }
}

async fn fetch_route_limits(
    store: &dyn Store,
    previous: &HashMap<String, Limit>,
) -> HashMap<String, Limit> {
    match store.get(keys::ROUTE_LIMITS).await {
        Ok(Some(raw)) => match serde_json::from_str::<HashMap<String, Limit>>(&raw) {
            Ok(map) => map,
            Err(e) => {
                let err = GuardianError::ConfigParse(e.to_string());
                warn!(error = %err, "malformed route limits in store, keeping previous value");
                previous.clone()
            }
        },
        Ok(None) => previous.clone(),
        Err(e) => {
            warn!(error = %e, "failed to sync route limits, keeping previous value");
            previous.clone()
        }
    }
}

async fn fetch_report_only(store: &dyn Store, previous: bool) -> bool {
    match store.get(keys::REPORT_ONLY).await {
        Ok(Some(raw)) => raw.parse().unwrap_or(previous),
        Ok(None) => previous,
        Err(e) => {
            warn!(error = %e, "failed to sync report-only flag, keeping previous value");
            previous
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Defaults;
    use crate::store::LocalStore;

    #[tokio::test]
    async fn sync_picks_up_store_values() {
        let conf_store = Arc::new(ConfStore::from_defaults(&Defaults::default()));
        let store = LocalStore::new();

        store
            .sadd(keys::WHITELIST_SET, &["10.0.0.0/8".to_string()])
            .await
            .unwrap();
        store
            .set(
                keys::GLOBAL_LIMIT,
                &serde_json::to_string(&Limit::new(20, super::super::Duration::from_secs(1))).unwrap(),
            )
            .await
            .unwrap();
        store.set(keys::REPORT_ONLY, "true").await.unwrap();

        sync_once(&conf_store, &store).await;

        let snap = conf_store.snapshot();
        assert!(snap.whitelist.contains("10.1.2.3".parse().unwrap()));
        assert_eq!(snap.global_limit.count, 20);
        assert!(snap.report_only);
    }

    #[tokio::test]
    async fn sync_preserves_previous_value_on_malformed_field() {
        let defaults = Defaults {
            global_limit: Limit::new(5, super::super::Duration::from_secs(1)),
            ..Default::default()
        };
        let conf_store = Arc::new(ConfStore::from_defaults(&defaults));
        let store = LocalStore::new();

        store.set(keys::GLOBAL_LIMIT, "not json").await.unwrap();

        sync_once(&conf_store, &store).await;

        assert_eq!(conf_store.snapshot().global_limit.count, 5);
    }
}
