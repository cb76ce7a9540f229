use crate::chain::Chain;
use crate::config::ConfStore;
use crate::metrics::MetricReporter;
use crate::request::Request;
use std::sync::Arc;
use std::time::Instant;

/// Final verdict returned to whatever front-end adapter is asking
/// "should this request be let through".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub remaining: u32,
}

/// Orchestrates one admission decision: snapshot the config once, run
/// the chain against it, apply the report-only override, and record
/// metrics. This is the single entry point every front-end adapter
/// (the authorization listener, or an embedder) calls (spec §4.7).
pub struct DecisionEngine {
    chain: Chain,
    conf_store: Arc<ConfStore>,
    reporter: Arc<dyn MetricReporter>,
}

impl DecisionEngine {
    pub fn new(chain: Chain, conf_store: Arc<ConfStore>, reporter: Arc<dyn MetricReporter>) -> Self {
        Self { chain, conf_store, reporter }
    }

    pub async fn decide(&self, req: &Request) -> Decision {
        let start = Instant::now();
        let snapshot = self.conf_store.snapshot();

        let outcome = self.chain.evaluate(req, &snapshot).await;
        let elapsed = start.elapsed();

        let would_block = outcome.block;
        let actually_blocked = would_block && !snapshot.report_only;
        let remaining = outcome.remaining.unwrap_or(u32::MAX);

        // Telemetry carries the would-have-blocked flag, not the
        // report-only-overridden one, so dashboards can observe
        // would-have-blocks even when report-only suppresses actual
        // enforcement (spec §4.7).
        self.reporter
            .record_decision(&req.authority, would_block, outcome.error, elapsed);

        Decision {
            allowed: !actually_blocked,
            remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BlacklistPredicate, WhitelistPredicate};
    use crate::config::Defaults;
    use crate::metrics::NullReporter;

    fn req(ip: &str) -> Request {
        Request::new(ip, "example.com", "/", "GET")
    }

    #[tokio::test]
    async fn report_only_allows_but_still_counts_would_block() {
        let defaults = Defaults {
            blacklist: vec!["10.0.0.0/8".to_string()],
            report_only: true,
            ..Default::default()
        };
        let conf_store = Arc::new(ConfStore::from_defaults(&defaults));
        let chain = Chain::new(vec![Box::new(WhitelistPredicate), Box::new(BlacklistPredicate)]);
        let engine = DecisionEngine::new(chain, conf_store, Arc::new(NullReporter));

        let decision = engine.decide(&req("10.1.2.3")).await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn normal_mode_blocks_on_blacklist_hit() {
        let defaults = Defaults {
            blacklist: vec!["10.0.0.0/8".to_string()],
            ..Default::default()
        };
        let conf_store = Arc::new(ConfStore::from_defaults(&defaults));
        let chain = Chain::new(vec![Box::new(WhitelistPredicate), Box::new(BlacklistPredicate)]);
        let engine = DecisionEngine::new(chain, conf_store, Arc::new(NullReporter));

        let decision = engine.decide(&req("10.1.2.3")).await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn unmatched_request_is_allowed() {
        let conf_store = Arc::new(ConfStore::from_defaults(&Defaults::default()));
        let chain = Chain::new(vec![Box::new(WhitelistPredicate), Box::new(BlacklistPredicate)]);
        let engine = DecisionEngine::new(chain, conf_store, Arc::new(NullReporter));

        let decision = engine.decide(&req("8.8.8.8")).await;
        assert!(decision.allowed);
    }
}
