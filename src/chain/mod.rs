use crate::config::ConfigSnapshot;
use crate::limit_provider::LimitProvider;
use crate::limiter::Limiter;
use crate::request::Request;
use crate::store::Store;
use async_trait::async_trait;
use std::sync::Arc;

/// Result of one predicate's evaluation: whether the chain should stop
/// evaluating further predicates, and if it stops, whether the request
/// is blocked. A predicate that does not want to decide the outcome
/// returns `stop: false` and the chain moves on (spec §4.6).
///
/// `error` flags that this predicate took a fail-open path (spec §7:
/// the decision engine aggregates the last non-nil error across the
/// whole chain and passes it to telemetry, even though an error alone
/// never halts the chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub stop: bool,
    pub block: bool,
    pub remaining: Option<u32>,
    pub error: bool,
}

impl Outcome {
    pub fn continue_chain() -> Self {
        Self { stop: false, block: false, remaining: None, error: false }
    }

    pub fn allow() -> Self {
        Self { stop: true, block: false, remaining: None, error: false }
    }

    pub fn deny() -> Self {
        Self { stop: true, block: true, remaining: None, error: false }
    }

    /// A limiter's verdict. Per spec §4.6's `CondStopOnBlock`: the chain
    /// only halts when the request is actually blocked; an allowed
    /// request (whether on budget or via fail-open) continues so a
    /// later predicate (e.g. the per-route limiter after the global
    /// one) still gets to run.
    pub fn rate_limited(block: bool, remaining: u32, error: bool) -> Self {
        Self { stop: block, block, remaining: Some(remaining), error }
    }
}

/// One link in the admission chain.
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn evaluate(&self, req: &Request, snapshot: &ConfigSnapshot) -> Outcome;
}

/// Stops and allows the request if its address is in the whitelist.
/// Whitelisted traffic bypasses every predicate after it, including
/// rate limiting (spec §4.3).
pub struct WhitelistPredicate;

#[async_trait]
impl Predicate for WhitelistPredicate {
    async fn evaluate(&self, req: &Request, snapshot: &ConfigSnapshot) -> Outcome {
        match req.parsed_ip() {
            Some(ip) if snapshot.whitelist.contains(ip) => Outcome::allow(),
            _ => Outcome::continue_chain(),
        }
    }
}

/// Stops and denies the request if its address is in the blacklist.
/// Blacklist is checked after whitelist so an address present in both
/// is allowed -- an operator's explicit allow always wins.
pub struct BlacklistPredicate;

#[async_trait]
impl Predicate for BlacklistPredicate {
    async fn evaluate(&self, req: &Request, snapshot: &ConfigSnapshot) -> Outcome {
        match req.parsed_ip() {
            Some(ip) if snapshot.blacklist.contains(ip) => Outcome::deny(),
            _ => Outcome::continue_chain(),
        }
    }
}

/// Runs one `LimitProvider` against the shared counter store. Several
/// of these can be chained (e.g. global limit, then per-route limit):
/// a block stops the chain immediately, but an allow (budget available,
/// or fail-open) lets evaluation continue to the next predicate so
/// every applicable limiter gets to run, matching a short-circuit
/// firewall rule list.
pub struct LimitPredicate {
    store: Arc<dyn Store>,
    provider: Box<dyn LimitProvider>,
    namespace: &'static str,
}

impl LimitPredicate {
    pub fn new(store: Arc<dyn Store>, provider: Box<dyn LimitProvider>, namespace: &'static str) -> Self {
        Self { store, provider, namespace }
    }
}

#[async_trait]
impl Predicate for LimitPredicate {
    async fn evaluate(&self, req: &Request, snapshot: &ConfigSnapshot) -> Outcome {
        let limit = self.provider.limit_for(req, snapshot);
        if !limit.enabled {
            return Outcome::continue_chain();
        }

        let decision = Limiter::check(
            self.store.as_ref(),
            self.namespace,
            &req.remote_address,
            limit,
        )
        .await;

        Outcome::rate_limited(decision.blocked, decision.remaining, decision.error)
    }
}

/// Evaluates predicates in order, stopping at the first one that says
/// `stop: true`. A chain that runs to completion without any predicate
/// stopping is treated as an allow. The last `remaining` count seen
/// from any predicate (stopping or not) is carried to the final
/// outcome, and `error` aggregates across the whole chain, not just
/// the stopping predicate (spec §7).
pub struct Chain {
    predicates: Vec<Box<dyn Predicate>>,
}

impl Chain {
    pub fn new(predicates: Vec<Box<dyn Predicate>>) -> Self {
        Self { predicates }
    }

    pub async fn evaluate(&self, req: &Request, snapshot: &ConfigSnapshot) -> Outcome {
        let mut remaining = None;
        let mut error = false;

        for predicate in &self.predicates {
            let outcome = predicate.evaluate(req, snapshot).await;
            if outcome.remaining.is_some() {
                remaining = outcome.remaining;
            }
            error = error || outcome.error;

            if outcome.stop {
                return Outcome { remaining, error, ..outcome };
            }
        }

        Outcome { remaining, error, ..Outcome::allow() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Defaults, Limit};
    use crate::limit_provider::{GlobalLimitProvider, RoutePerRouteLimitProvider};
    use crate::store::LocalStore;

    fn req(ip: &str) -> Request {
        Request::new(ip, "example.com", "/", "GET")
    }

    #[tokio::test]
    async fn whitelist_bypasses_blacklist_and_limiter() {
        let defaults = Defaults {
            whitelist: vec!["10.0.0.0/8".to_string()],
            blacklist: vec!["10.0.0.0/8".to_string()],
            global_limit: Limit::new(0, crate::config::Duration::from_secs(60)),
            ..Default::default()
        };
        let snapshot = crate::config::ConfStore::from_defaults(&defaults).snapshot();
        let store: Arc<dyn Store> = Arc::new(LocalStore::new());
        let chain = Chain::new(vec![
            Box::new(WhitelistPredicate),
            Box::new(BlacklistPredicate),
            Box::new(LimitPredicate::new(store, Box::new(GlobalLimitProvider), "global")),
        ]);

        let outcome = chain.evaluate(&req("10.1.2.3"), &snapshot).await;
        assert!(!outcome.block);
    }

    #[tokio::test]
    async fn blacklist_blocks_before_limiter_runs() {
        let defaults = Defaults {
            blacklist: vec!["10.0.0.0/8".to_string()],
            ..Default::default()
        };
        let snapshot = crate::config::ConfStore::from_defaults(&defaults).snapshot();
        let store: Arc<dyn Store> = Arc::new(LocalStore::new());
        let chain = Chain::new(vec![
            Box::new(WhitelistPredicate),
            Box::new(BlacklistPredicate),
            Box::new(LimitPredicate::new(store, Box::new(GlobalLimitProvider), "global")),
        ]);

        let outcome = chain.evaluate(&req("10.1.2.3"), &snapshot).await;
        assert!(outcome.block);
    }

    #[tokio::test]
    async fn limiter_blocks_once_budget_exhausted() {
        let defaults = Defaults {
            global_limit: Limit::new(1, crate::config::Duration::from_secs(60)),
            ..Default::default()
        };
        let snapshot = crate::config::ConfStore::from_defaults(&defaults).snapshot();
        let store: Arc<dyn Store> = Arc::new(LocalStore::new());
        let chain = Chain::new(vec![
            Box::new(WhitelistPredicate),
            Box::new(BlacklistPredicate),
            Box::new(LimitPredicate::new(store, Box::new(GlobalLimitProvider), "global")),
        ]);

        let first = chain.evaluate(&req("1.1.1.1"), &snapshot).await;
        assert!(!first.block);
        let second = chain.evaluate(&req("1.1.1.1"), &snapshot).await;
        assert!(second.block);
    }

    #[tokio::test]
    async fn global_limiter_allowing_does_not_shortcircuit_route_limiter() {
        // A global limiter that has budget left must NOT stop the
        // chain -- the per-route limiter after it still needs to run
        // and can still block the request on its own tighter budget.
        let defaults = Defaults {
            global_limit: Limit::new(1000, crate::config::Duration::from_secs(60)),
            route_limits: vec![crate::config::RouteLimitEntry {
                path: "/api/widgets".to_string(),
                limit: Limit::new(0, crate::config::Duration::from_secs(60)),
            }],
            ..Default::default()
        };
        let snapshot = crate::config::ConfStore::from_defaults(&defaults).snapshot();
        let store: Arc<dyn Store> = Arc::new(LocalStore::new());
        let chain = Chain::new(vec![
            Box::new(WhitelistPredicate),
            Box::new(BlacklistPredicate),
            Box::new(LimitPredicate::new(store.clone(), Box::new(GlobalLimitProvider), "global")),
            Box::new(LimitPredicate::new(
                store,
                Box::new(RoutePerRouteLimitProvider),
                "route",
            )),
        ]);

        let outcome = chain
            .evaluate(&Request::new("8.8.8.8", "example.com", "/api/widgets", "GET"), &snapshot)
            .await;
        assert!(outcome.block, "route limiter (count=0) must still run and block");
    }

    #[tokio::test]
    async fn chain_with_no_predicates_allows() {
        let snapshot = crate::config::ConfStore::from_defaults(&Defaults::default()).snapshot();
        let chain = Chain::new(vec![]);
        let outcome = chain.evaluate(&req("1.1.1.1"), &snapshot).await;
        assert!(!outcome.block);
    }
}
