use super::{Store, StoreResult};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::time::{Duration, Instant};

/// Local in-memory store for single-node deployments and tests. All
/// state lives in this process; multiple guardian instances pointed at
/// separate `LocalStore`s do NOT share a counting budget (that's what
/// `ValkeyStore` is for).
pub struct LocalStore {
    counters: DashMap<String, CounterEntry>,
    sets: DashMap<String, HashSet<String>>,
    scalars: DashMap<String, String>,
    /// Serializes incr's read-check-write so concurrent callers can't
    /// both observe "key absent" and both set the TTL.
    incr_lock: RwLock<()>,
}

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

impl LocalStore {
    pub fn new() -> Self {
        Self {
            counters: DashMap::new(),
            sets: DashMap::new(),
            scalars: DashMap::new(),
            incr_lock: RwLock::new(()),
        }
    }

    /// Drop expired counters; callers may run this periodically to
    /// bound memory growth. Not required for correctness -- an expired
    /// entry is treated as absent regardless.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.counters.retain(|_, entry| entry.expires_at > now);
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn incr(&self, key: &str, delta: u64, ttl: Duration) -> StoreResult<u64> {
        let _guard = self.incr_lock.write();
        let now = Instant::now();

        let mut entry = self.counters.entry(key.to_string()).or_insert_with(|| CounterEntry {
            count: 0,
            expires_at: now + ttl,
        });

        if entry.expires_at <= now {
            // Expired: this increment recreates the key, so it also
            // resets the TTL.
            entry.count = 0;
            entry.expires_at = now + ttl;
        }

        entry.count += delta;
        Ok(entry.count)
    }

    async fn sadd(&self, set_name: &str, members: &[String]) -> StoreResult<()> {
        let mut set = self.sets.entry(set_name.to_string()).or_default();
        for member in members {
            set.insert(member.clone());
        }
        Ok(())
    }

    async fn srem(&self, set_name: &str, members: &[String]) -> StoreResult<()> {
        if let Some(mut set) = self.sets.get_mut(set_name) {
            for member in members {
                set.remove(member);
            }
        }
        Ok(())
    }

    async fn smembers(&self, set_name: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .sets
            .get(set_name)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.scalars.get(key).map(|v| v.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.scalars.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "local"
    }
}
