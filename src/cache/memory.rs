//! Memory Cache Module
//!
//! Size-and-time bounded store: lazy expiry on read, plus a periodic sweep
//! that drops expired entries and then evicts oldest-inserted entries until
//! the byte limit is met.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{Cache, CacheEntry, CacheStats, Clock, Counters, EvictionQueue};

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries dropped because they had expired
    pub expired: usize,
    /// Live entries dropped to get back under the byte limit
    pub evicted: usize,
    /// Total byte cost after the sweep
    pub size_bytes: u64,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    /// Always equal to the sum of `cost()` over `map`
    size: u64,
}

impl Entries {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.map.remove(key)?;
        self.size -= entry.cost();
        Some(entry)
    }
}

// == Memory Cache ==
/// In-memory cache bounded by total byte cost.
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<Entries>,
    counters: Counters,
    /// Byte capacity, 0 = unbounded
    limit_bytes: u64,
    clock: Arc<dyn Clock>,
}

impl MemoryCache {
    // == Constructor ==
    /// Creates an empty cache holding at most `limit_bytes` (0 = unbounded).
    pub fn new(limit_bytes: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            counters: Counters::new(clock.now()),
            limit_bytes,
            clock,
        }
    }

    // == Sweep ==
    /// Removes expired entries, then evicts oldest-inserted entries while
    /// the total cost exceeds the limit.
    pub async fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        debug!(
            size = entries.size,
            limit = self.limit_bytes,
            entries = entries.map.len(),
            "running cache sweep"
        );

        let expired: Vec<String> = entries
            .map
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
            debug!(key = %key, "sweep: removed expired entry");
        }

        let mut evicted = 0;
        if self.limit_bytes > 0 && entries.size > self.limit_bytes {
            let mut queue = EvictionQueue::new(
                entries
                    .map
                    .iter()
                    .map(|(key, entry)| (key.clone(), entry.created_at))
                    .collect(),
            );
            while entries.size > self.limit_bytes {
                let Some(key) = queue.pop_oldest() else {
                    break;
                };
                entries.remove(&key);
                evicted += 1;
                debug!(key = %key, size = entries.size, limit = self.limit_bytes, "sweep: evicted entry");
            }
        }

        SweepReport {
            expired: expired.len(),
            evicted,
            size_bytes: entries.size,
        }
    }

    // == Stats ==
    /// Returns a consistent statistics snapshot.
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        self.counters
            .snapshot(entries.map.len() as u64, entries.size, self.clock.now())
    }

    /// Byte capacity, 0 = unbounded.
    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn put_with_headers(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        headers: HeaderMap,
        ttl: Duration,
    ) -> Option<DateTime<Utc>> {
        if ttl.is_zero() {
            return None;
        }
        let ttl = ChronoDuration::from_std(ttl).ok()?;
        if self.limit_bytes > 0 && data.len() as u64 > self.limit_bytes {
            debug!(key, size = data.len(), limit = self.limit_bytes, "cache put rejected: entry too large");
            return None;
        }

        let Some(entry) = CacheEntry::new(data, content_type, self.clock.now(), ttl) else {
            debug!(key, ttl = %ttl, "cache put rejected: expiry out of range");
            return None;
        };
        let entry = entry.with_headers(headers);
        let expires_at = entry.expires_at;

        let mut entries = self.entries.write().await;
        entries.remove(key);
        entries.size += entry.cost();
        debug!(key, size = entries.size, limit = self.limit_bytes, expires = %expires_at, "cache put");
        entries.map.insert(key.to_string(), entry);
        self.counters.record_put();

        Some(expires_at)
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        match entries.map.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.counters.record_hit();
                Some(entry.clone())
            }
            _ => {
                debug!(key, "cache miss");
                self.counters.record_miss();
                None
            }
        }
    }
}
