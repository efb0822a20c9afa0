use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

/// TTL response cache with per-key in-flight gates.
///
/// A lookup is a hit while `now - stored_at < ttl`; a store unconditionally
/// overwrites the previous entry for the key. Expired entries are superseded
/// lazily and reclaimed by the periodic [`ResponseCache::sweep`]; the map is
/// cleared at shutdown.
///
/// The gate map collapses concurrent misses for the same key into one
/// upstream computation: a caller that misses acquires the key's gate,
/// re-checks the cache, and only then computes, so waiters find the fresh
/// entry instead of refetching.
pub struct ResponseCache<T> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    gates: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

struct CacheEntry<T> {
    payload: T,
    stored_at: DateTime<Utc>,
}

/// Cache key for the forecast request path: location plus horizon.
pub fn forecast_cache_key(lat: f64, lng: f64, hours: u32) -> String {
    format!("{lat},{lng},{hours}")
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            entries: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn lookup(&self, key: &str) -> Option<T> {
        self.lookup_at(key, Utc::now())
    }

    pub fn lookup_at(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let entries = self.lock_entries();
        let entry = entries.get(key)?;
        if now - entry.stored_at < self.ttl {
            Some(entry.payload.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: &str, payload: T) {
        self.insert_at(key, payload, Utc::now());
    }

    pub fn insert_at(&self, key: &str, payload: T, now: DateTime<Utc>) {
        self.lock_entries()
            .insert(key.to_string(), CacheEntry { payload, stored_at: now });
    }

    /// Returns the gate serializing computations for `key`. Hold the gate
    /// across the whole miss computation and re-check the cache after
    /// acquiring it.
    pub fn flight_gate(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut gates = self
            .gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        gates.entry(key.to_string()).or_default().clone()
    }

    /// Drops expired entries and idle gates. Returns the number of cache
    /// entries removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let removed = {
            let mut entries = self.lock_entries();
            let before = entries.len();
            entries.retain(|_, entry| now - entry.stored_at < self.ttl);
            before - entries.len()
        };
        let mut gates = self
            .gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        removed
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
        self.gates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
