use crate::config::{ConfigSnapshot, Limit};
use crate::error::GuardianError;
use crate::request::Request;
use tracing::warn;
use url::Url;

/// Opaque base every route path is parsed against so relative paths
/// become a comparable `Url`. Never surfaced; exists purely so
/// `url::Url::parse` has a scheme and authority to hang a path off of.
const CANONICAL_BASE: &str = "guardian://route";

/// Resolves the `Limit` that applies to an incoming request. Two
/// providers ship: one global limit for every request, and one keyed
/// by route (spec §4.5, §9 open question on URL equality).
pub trait LimitProvider: Send + Sync {
    fn limit_for(&self, req: &Request, snapshot: &ConfigSnapshot) -> Limit;
}

/// Always returns the single configured global limit, ignoring the
/// request entirely.
pub struct GlobalLimitProvider;

impl LimitProvider for GlobalLimitProvider {
    fn limit_for(&self, _req: &Request, snapshot: &ConfigSnapshot) -> Limit {
        snapshot.global_limit
    }
}

/// Looks up a limit keyed by the request's path, normalized the same
/// way route-limit config entries are normalized at sync time. Falls
/// back to `Limit::DISABLED` for paths the snapshot has no entry for,
/// or that fail to parse -- an unrecognized route is not rate-limited
/// by this provider, not blocked.
pub struct RoutePerRouteLimitProvider;

impl LimitProvider for RoutePerRouteLimitProvider {
    fn limit_for(&self, req: &Request, snapshot: &ConfigSnapshot) -> Limit {
        let key = canonical_route_key(&req.path);
        snapshot.route_limits.get(&key).copied().unwrap_or(Limit::DISABLED)
    }
}

/// Canonicalizes a path (with optional query string) into a key
/// comparable across requests that differ only in query-parameter
/// order: `(path, sorted query pairs)`. Host and scheme never factor
/// in -- `Request::path` carries neither (spec §9 resolution).
///
/// Unparseable input is logged and mapped to a key derived from the
/// raw string so it still round-trips through a `HashMap` consistently,
/// rather than being silently dropped.
pub fn canonical_route_key(path: &str) -> String {
    match Url::parse(CANONICAL_BASE).and_then(|base| base.join(path)) {
        Ok(parsed) => {
            let mut pairs: Vec<(String, String)> = parsed
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            pairs.sort();

            let query = pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");

            if query.is_empty() {
                parsed.path().to_string()
            } else {
                format!("{}?{}", parsed.path(), query)
            }
        }
        Err(e) => {
            let err = GuardianError::MalformedRequest(format!("{path}: {e}"));
            warn!(path, error = %err, "failed to parse route path, using raw string as key");
            path.to_string()
        }
    }
}
