//! Bounded, time-expiring response store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::cache::clock::{Clock, SystemClock};
use crate::cache::key::CacheKey;
use crate::http::response::ProxyResponse;
use crate::observability::metrics;

struct CacheEntry {
    response: ProxyResponse,
    inserted_at: Instant,
    /// Position in the insertion order index.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Insertion sequence → key. With one TTL for every entry, the first
    /// element is always the next to expire.
    order: BTreeMap<u64, CacheKey>,
    next_seq: u64,
}

impl Inner {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Thread-safe TTL cache with a hard entry limit.
pub struct ResponseCache {
    inner: Mutex<Inner>,
    ttl: Duration,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Create a cache driven by the system clock.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self::with_clock(ttl, max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl,
            max_entries,
            clock,
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.inserted_at) >= self.ttl
    }

    /// Look up a live entry. Expired entries are removed and reported absent.
    pub fn get(&self, key: &CacheKey) -> Option<ProxyResponse> {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("response cache mutex poisoned");

        match inner.entries.get(key) {
            None => return None,
            Some(entry) if !self.is_expired(entry, now) => {
                return Some(entry.response.clone());
            }
            Some(_) => {}
        }

        inner.remove(key);
        metrics::record_cache_event("expire");
        metrics::record_cache_size(inner.entries.len());
        None
    }

    /// Insert or replace an entry. A new key arriving at capacity evicts
    /// exactly one entry, the oldest.
    pub fn put(&self, key: CacheKey, response: ProxyResponse) {
        if self.max_entries == 0 {
            return;
        }

        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("response cache mutex poisoned");

        // Replacing refreshes the insertion time and moves the key to the back.
        let replaced = inner.remove(&key).is_some();

        if !replaced && inner.entries.len() >= self.max_entries {
            if let Some(evicted) = inner.evict_oldest() {
                tracing::debug!(key = %evicted.digest(), "Cache full, evicted oldest entry");
                metrics::record_cache_event("evict");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                response,
                inserted_at: now,
                seq,
            },
        );
        metrics::record_cache_size(inner.entries.len());
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock().expect("response cache mutex poisoned");

        let mut purged = 0;
        loop {
            let expired = match inner.order.first_key_value() {
                Some((_, key)) => inner
                    .entries
                    .get(key)
                    .map_or(true, |entry| self.is_expired(entry, now)),
                None => false,
            };
            if !expired {
                break;
            }
            inner.evict_oldest();
            purged += 1;
        }

        if purged > 0 {
            metrics::record_cache_size(inner.entries.len());
        }
        purged
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("response cache mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("len", &self.len())
            .finish()
    }
}
