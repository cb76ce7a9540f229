use super::Duration;
use crate::store::StoreConfig;
use serde::{Deserialize, Serialize};

/// On-disk configuration for a guardian process: which store backend to
/// use, the defaults a fresh `ConfStore` boots with before its first
/// successful sync, and the ambient listener/metrics wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub defaults: Defaults,

    /// How often the synchronizer refreshes the cached snapshot from
    /// the store.
    #[serde(default = "default_sync_interval")]
    pub sync_interval: Duration,

    /// Listener address for the reference authorization adapter.
    #[serde(default = "default_authorize_address")]
    pub authorize_address: String,

    /// Listener address for the admin (config mutator) API.
    #[serde(default = "default_admin_address")]
    pub admin_address: String,

    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            defaults: Defaults::default(),
            sync_interval: default_sync_interval(),
            authorize_address: default_authorize_address(),
            admin_address: default_admin_address(),
            metrics: None,
        }
    }
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_authorize_address() -> String {
    "0.0.0.0:9191".to_string()
}

fn default_admin_address() -> String {
    "127.0.0.1:9192".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_address")]
    pub address: String,

    /// Static label attached to every emitted metric, letting one
    /// Prometheus instance distinguish series from several guardian
    /// deployments fronting different ingress classes (spec §4.7/§6).
    #[serde(default = "default_ingress_class")]
    pub ingress_class: String,
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_ingress_class() -> String {
    "guardian".to_string()
}

/// Seed values the `ConfStore` is constructed with; overwritten by the
/// first successful sync against the store, and retained as-is if the
/// store is unreachable at startup (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Defaults {
    #[serde(default)]
    pub whitelist: Vec<String>,

    #[serde(default)]
    pub blacklist: Vec<String>,

    #[serde(default)]
    pub global_limit: Limit,

    #[serde(default)]
    pub route_limits: Vec<RouteLimitEntry>,

    #[serde(default)]
    pub report_only: bool,
}

/// A single (path, Limit) entry as configured on disk; normalized into
/// the canonical route-key form by the limit provider at load time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteLimitEntry {
    pub path: String,
    pub limit: Limit,
}

/// `{ Count, Duration, Enabled }` from spec §3. `Enabled = false` makes
/// the predicate a no-op; `Count = 0` with `Enabled = true` blocks every
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limit {
    pub count: u64,
    pub duration: Duration,
    pub enabled: bool,
}

impl Limit {
    pub const DISABLED: Limit = Limit {
        count: 0,
        duration: Duration::ZERO,
        enabled: false,
    };

    pub fn new(count: u64, duration: Duration) -> Self {
        Self {
            count,
            duration,
            enabled: true,
        }
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self::DISABLED
    }
}
