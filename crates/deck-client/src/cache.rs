use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// `(server id, request path)`
pub type CacheKey = (String, String);

/// Response cache shared by every client talking to any server.
pub type SharedCache = Arc<Mutex<TtlCache<CacheKey, Value>>>;

pub fn shared_cache(ttl: Duration) -> SharedCache {
    Arc::new(Mutex::new(TtlCache::new(ttl)))
}

/// Time-bounded response cache.
/// Expired entries are evicted lazily on lookup or by `purge_expired`.
pub struct TtlCache<K, V> {
    ttl: Duration,
    /// key → (stored at, value)
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A clone of the value if it is still fresh. Stale entries are removed.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let fresh = match self.entries.get(key) {
            Some((stored_at, _)) => stored_at.elapsed() <= self.ttl,
            None => return None,
        };
        if fresh {
            self.entries.get(key).map(|(_, v)| v.clone())
        } else {
            self.entries.remove(key);
            None
        }
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, (Instant::now(), value));
    }

    /// Returns true if an entry was removed.
    pub fn invalidate(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Drop every entry whose key matches. Returns how many were removed.
    pub fn invalidate_where(&mut self, mut pred: impl FnMut(&K) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| !pred(k));
        before - self.entries.len()
    }

    pub fn purge_expired(&mut self) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= ttl);
        before - self.entries.len()
    }

    /// Number of stored entries, fresh or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
