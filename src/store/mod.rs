mod local;
mod valkey;

pub use local::LocalStore;
pub use valkey::ValkeyStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("operation timeout")]
    Timeout,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store unavailable")]
    Unavailable,
}

/// Abstraction the core consumes for atomic counters, CIDR/config sets,
/// and config scalars. Implementations are local (single-process,
/// `LocalStore`) or distributed (`ValkeyStore`), per spec §4.1.
///
/// Every op takes an implicit deadline via the tokio runtime's own
/// cancellation (callers wrap calls with `tokio::time::timeout`); the
/// trait itself stays synchronous-shaped like the teacher's `Store`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Atomic `count += delta`. If the key did not exist, sets
    /// `count = delta` AND sets the expiry to `ttl` in the same atomic
    /// step; if it already existed, the expiry is left untouched.
    /// Returns the post-increment count.
    async fn incr(&self, key: &str, delta: u64, ttl: Duration) -> StoreResult<u64>;

    async fn sadd(&self, set_name: &str, members: &[String]) -> StoreResult<()>;

    async fn srem(&self, set_name: &str, members: &[String]) -> StoreResult<()>;

    async fn smembers(&self, set_name: &str) -> StoreResult<Vec<String>>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Check if the store is reachable.
    async fn health_check(&self) -> StoreResult<()>;

    fn store_type(&self) -> &'static str;
}

/// Create a store from configuration.
pub async fn create_store(config: &StoreConfig) -> StoreResult<Arc<dyn Store>> {
    match config {
        StoreConfig::Local => Ok(Arc::new(LocalStore::new())),
        StoreConfig::Valkey(valkey_config) => {
            let store = ValkeyStore::new(valkey_config).await?;
            Ok(Arc::new(store))
        }
    }
}

/// Store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StoreConfig {
    Local,
    Valkey(ValkeyConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Local
    }
}

/// Valkey/Redis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValkeyConfig {
    /// Redis/Valkey endpoint. "redis://host:port" or "rediss://host:port"
    /// for TLS.
    pub endpoint: String,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub db: i64,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: crate::config::Duration,

    #[serde(default = "default_operation_timeout")]
    pub operation_timeout: crate::config::Duration,
}

fn default_key_prefix() -> String {
    "guardian".to_string()
}

fn default_connect_timeout() -> crate::config::Duration {
    crate::config::Duration::from_secs(5)
}

fn default_operation_timeout() -> crate::config::Duration {
    crate::config::Duration::from_secs(1)
}

/// Well-known store key/set names, per spec §6.
pub mod keys {
    pub const WHITELIST_SET: &str = "whitelist_ipnets";
    pub const BLACKLIST_SET: &str = "blacklist_ipnets";
    pub const GLOBAL_LIMIT: &str = "global_limit";
    pub const ROUTE_LIMITS: &str = "route_limits";
    pub const REPORT_ONLY: &str = "report_only";

    /// `<client-ip>:<bucket-start-epoch-seconds>`, per spec §3.
    pub fn counter_key(client_address: &str, bucket_start_secs: u64) -> String {
        format!("{}:{}", client_address, bucket_start_secs)
    }
}
