//! In-memory TTL cache for oracle responses, keyed by request URL.
//!
//! Entries are evicted lazily: `get`/`has` drop an entry they find expired,
//! and `size` sweeps the whole map. There is no background eviction task.
//! Time comes from `tokio::time::Instant` so paused-clock tests can step
//! past a TTL without sleeping.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

struct CacheEntry<T> {
    data: T,
    expiry: Instant,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expiry
    }
}

/// Short-lived response cache. One mutex per instance; the lock is never
/// held across an `.await`.
pub struct ResponseCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    default_ttl: Duration,
}

impl<T: Clone> ResponseCache<T> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `data` under `key` with the default TTL.
    pub fn insert(&self, key: impl Into<String>, data: T) {
        self.set(key, data, self.default_ttl);
    }

    /// Store `data` under `key`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, data: T, ttl: Duration) {
        let entry = CacheEntry {
            data,
            expiry: Instant::now() + ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Live value for `key`, evicting it if it has expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.data.clone()),
            None => None,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        let mut entries = self.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn delete(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of live entries. Expired entries found during the scan are
    /// removed.
    pub fn size(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.is_expired(now));
        entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
