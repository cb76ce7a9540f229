use super::{Store, StoreError, StoreResult, ValkeyConfig};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use std::future::Future;
use std::time::Duration;

/// Atomic increment-with-TTL-on-create. `INCRBY` is itself atomic in
/// Redis; the script adds "also EXPIRE, but only if this call created
/// the key" as a single transaction so a concurrent caller can never
/// observe a counter with no TTL set.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local key = KEYS[1]
local delta = tonumber(ARGV[1])
local ttl = tonumber(ARGV[2])
local new = redis.call('INCRBY', key, delta)
if new == delta then
    redis.call('EXPIRE', key, ttl)
end
return new
"#;

/// Distributed store backed by Valkey/Redis, used when multiple
/// guardian instances must agree on the same rate-limit budget.
pub struct ValkeyStore {
    conn: ConnectionManager,
    key_prefix: String,
    incr_script: Script,
    operation_timeout: Duration,
}

impl ValkeyStore {
    pub async fn new(config: &ValkeyConfig) -> StoreResult<Self> {
        let client = Self::create_client(config)?;

        let conn = tokio::time::timeout(
            config.connect_timeout.as_std(),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| StoreError::Timeout)?
        .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
            incr_script: Script::new(INCR_WITH_TTL_SCRIPT),
            operation_timeout: config.operation_timeout.as_std(),
        })
    }

    /// Bounds every store call by the configured operation timeout
    /// (spec §4.1/§5: "blocking is bounded by configured dial/read/write
    /// timeouts"). A call that does not resolve in time is reported as
    /// `StoreError::Timeout`, which the fail-open policy treats the same
    /// as any other store error.
    async fn bounded<T>(&self, fut: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    fn create_client(config: &ValkeyConfig) -> StoreResult<Client> {
        let mut url = config.endpoint.clone();

        if !url.contains('@') {
            if let (Some(user), Some(pass)) = (&config.username, &config.password) {
                if let Some(pos) = url.find("://") {
                    let (scheme, rest) = url.split_at(pos + 3);
                    url = format!("{}{}:{}@{}", scheme, user, pass, rest);
                }
            } else if let Some(pass) = &config.password {
                if let Some(pos) = url.find("://") {
                    let (scheme, rest) = url.split_at(pos + 3);
                    url = format!("{}:{}@{}", scheme, pass, rest);
                }
            }
        }

        if config.db != 0 && !url.contains('/') {
            url = format!("{}/{}", url, config.db);
        }

        Client::open(url.as_str())
            .map_err(|e| StoreError::Connection(format!("failed to create client: {}", e)))
    }

    #[inline]
    fn key(&self, part: &str) -> String {
        format!("{}:{}", self.key_prefix, part)
    }
}

#[async_trait]
impl Store for ValkeyStore {
    async fn incr(&self, key: &str, delta: u64, ttl: Duration) -> StoreResult<u64> {
        let full_key = self.key(&format!("counter:{}", key));
        let mut conn = self.conn.clone();

        self.bounded(async move {
            self.incr_script
                .key(&full_key)
                .arg(delta)
                .arg(ttl.as_secs().max(1))
                .invoke_async(&mut conn)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))
        })
        .await
    }

    async fn sadd(&self, set_name: &str, members: &[String]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let key = self.key(set_name);
        let mut conn = self.conn.clone();

        self.bounded(async move {
            conn.sadd::<_, _, ()>(&key, members)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))
        })
        .await
    }

    async fn srem(&self, set_name: &str, members: &[String]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let key = self.key(set_name);
        let mut conn = self.conn.clone();

        self.bounded(async move {
            conn.srem::<_, _, ()>(&key, members)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))
        })
        .await
    }

    async fn smembers(&self, set_name: &str) -> StoreResult<Vec<String>> {
        let key = self.key(set_name);
        let mut conn = self.conn.clone();

        self.bounded(async move {
            conn.smembers(&key)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))
        })
        .await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let full_key = self.key(key);
        let mut conn = self.conn.clone();

        self.bounded(async move {
            conn.get(&full_key)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let full_key = self.key(key);
        let mut conn = self.conn.clone();

        self.bounded(async move {
            conn.set::<_, _, ()>(&full_key, value)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))
        })
        .await
    }

    async fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();

        self.bounded(async move {
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            Ok(())
        })
        .await
    }

    fn store_type(&self) -> &'static str {
        "valkey"
    }
}
