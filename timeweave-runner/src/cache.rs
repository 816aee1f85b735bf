//! In-memory TTL cache for query responses.
//!
//! Keys are BLAKE3 hashes of the canonical JSON of the request parameters.
//! Each key owns a slot guarded by its own mutex: a miss computes the value
//! while holding the slot, so concurrent requests for the same key wait for
//! the first one and share its result. Errors are never cached.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Content hash of a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash `namespace` and `params` into a stable key.
    ///
    /// `params` serializes its fields in declaration order, so equal
    /// parameters always hash to the same key.
    pub fn new<P: Serialize>(namespace: &str, params: &P) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::json!({
            "ns": namespace,
            "params": serde_json::to_value(params)?,
        });
        let hash = blake3::hash(canonical.to_string().as_bytes());
        Ok(Self(hash.to_hex().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct Entry<V> {
    expires_at: Instant,
    value: Arc<V>,
}

type Slot<V> = Arc<Mutex<Option<Entry<V>>>>;

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct ResponseCache<V> {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot<V>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V> ResponseCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, key: &CacheKey) -> Slot<V> {
        Arc::clone(lock(&self.slots).entry(key.clone()).or_default())
    }

    /// Return the live value for `key`, or compute, store and return it.
    ///
    /// Only one caller computes a given key at a time. If `compute` fails the
    /// error is returned and the slot stays empty. Every miss also purges
    /// expired slots, so stale responses do not accumulate.
    pub fn get_or_try_insert_with<F, E>(&self, key: &CacheKey, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = self.slot(key);
        let mut entry = lock(&slot);
        let now = Instant::now();

        if let Some(live) = entry.as_ref().filter(|e| e.expires_at > now) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(key = %key, "cache hit");
            return Ok(Arc::clone(&live.value));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        // Our own slot is locked here, so the purge keeps it.
        let purged = self.purge_expired();
        tracing::debug!(key = %key, purged, "cache miss");
        let value = Arc::new(compute()?);
        *entry = Some(Entry {
            expires_at: Instant::now() + self.ttl,
            value: Arc::clone(&value),
        });
        Ok(value)
    }

    /// Live value for `key`, without computing.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<V>> {
        let slot = lock(&self.slots).get(key).cloned()?;
        let entry = lock(&slot);
        entry
            .as_ref()
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| Arc::clone(&e.value))
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        lock(&self.slots).clear();
    }

    /// Drop expired and empty slots. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut slots = lock(&self.slots);
        let before = slots.len();
        // A slot that is locked is being filled right now; keep it.
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry.as_ref().is_some_and(|e| e.expires_at > now),
            Err(_) => true,
        });
        before - slots.len()
    }

    /// Number of slots, live or not.
    pub fn len(&self) -> usize {
        lock(&self.slots).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<V> fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("slots", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}
