//! Cost Cache Module
//!
//! Admission-controlled cache backed by moka: capacity is weighed in bytes
//! and eviction follows moka's TinyLFU policy. Per-entry expiry is enforced
//! both by moka and by a read-time check against the shared clock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use moka::future::Cache as MokaCache;
use moka::ops::compute::Op;
use moka::Expiry;
use tracing::debug;

use crate::cache::{Cache, CacheEntry, CacheStats, Clock, Counters};

/// Expires each entry after its own TTL, restarting on replacement.
struct EntryExpiry;

impl EntryExpiry {
    fn ttl_of(entry: &CacheEntry) -> Option<Duration> {
        (entry.expires_at - entry.created_at).to_std().ok()
    }
}

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, value: &CacheEntry, _created_at: Instant) -> Option<Duration> {
        Self::ttl_of(value)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Self::ttl_of(value)
    }
}

// == Cost Cache ==
pub struct CostCache {
    store: MokaCache<String, CacheEntry>,
    counters: Counters,
    limit_bytes: u64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CostCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostCache")
            .field("limit_bytes", &self.limit_bytes)
            .field("entries", &self.store.entry_count())
            .finish()
    }
}

impl CostCache {
    /// Creates a cache weighing at most `limit_bytes` (0 = unbounded).
    pub fn new(limit_bytes: u64, clock: Arc<dyn Clock>) -> Self {
        let mut builder = MokaCache::builder()
            .weigher(|_key: &String, entry: &CacheEntry| -> u32 {
                entry.cost().try_into().unwrap_or(u32::MAX)
            })
            .expire_after(EntryExpiry);
        if limit_bytes > 0 {
            builder = builder.max_capacity(limit_bytes);
        }

        Self {
            store: builder.build(),
            counters: Counters::new(clock.now()),
            limit_bytes,
            clock,
        }
    }

    /// Removes the entry at `key` only if it is still the one stored at
    /// `stored_at`, so a concurrent replacement survives.
    async fn drop_stale(&self, key: &str, stored_at: DateTime<Utc>) {
        self.store
            .entry_by_ref(key)
            .and_compute_with(|current| async move {
                match current {
                    Some(entry) if entry.value().created_at == stored_at => Op::Remove,
                    _ => Op::Nop,
                }
            })
            .await;
    }

    /// Flushes moka's pending maintenance and returns a snapshot.
    pub async fn stats(&self) -> CacheStats {
        self.store.run_pending_tasks().await;
        self.counters.snapshot(
            self.store.entry_count(),
            self.store.weighted_size(),
            self.clock.now(),
        )
    }
}

#[async_trait]
impl Cache for CostCache {
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
        self.store.insert(key.to_string(), entry).await;
        self.counters.record_put();
        debug!(key, expires = %expires_at, "cache put");

        Some(expires_at)
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now();
        match self.store.get(key).await {
            Some(entry) if !entry.is_expired(now) => {
                self.counters.record_hit();
                Some(entry)
            }
            Some(stale) => {
                self.drop_stale(key, stale.created_at).await;
                debug!(key, "cache miss: expired");
                self.counters.record_miss();
                None
            }
            None => {
                debug!(key, "cache miss");
                self.counters.record_miss();
                None
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    const TTL: Duration = Duration::from_secs(300);

    fn cache_with_clock(limit: u64) -> (CostCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (CostCache::new(limit, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (cache, _) = cache_with_clock(0);

        let expires = cache.put("k", Bytes::from_static(b"payload"), "application/json", TTL).await.unwrap();
        let entry = cache.get("k").await.unwrap();

        assert_eq!(entry.data, Bytes::from_static(b"payload"));
        assert_eq!(entry.content_type, "application/json");
        assert_eq!(entry.expires_at, expires);
    }

    #[tokio::test]
    async fn test_rejections_match_memory_cache() {
        let (cache, _) = cache_with_clock(4);

        assert!(cache.put("k", Bytes::from_static(b"x"), "", Duration::ZERO).await.is_none());
        assert!(cache.put("k", Bytes::from_static(b"12345"), "", TTL).await.is_none());
        assert_eq!(cache.stats().await.puts, 0);
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_served() {
        let (cache, clock) = cache_with_clock(0);

        cache.put("k", Bytes::from_static(b"v"), "", Duration::from_secs(30)).await;
        clock.advance(ChronoDuration::seconds(31));

        assert!(cache.get("k").await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_weighted_size_tracks_bytes() {
        let (cache, _) = cache_with_clock(0);

        cache.put("a", Bytes::from(vec![1u8; 100]), "", TTL).await;
        cache.put("b", Bytes::from(vec![1u8; 50]), "", TTL).await;

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.size_bytes, 150);
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let (cache, _) = cache_with_clock(1_000);

        for i in 0..100 {
            cache.put(&format!("key{i}"), Bytes::from(vec![0u8; 100]), "", TTL).await;
        }

        let stats = cache.stats().await;
        assert!(stats.size_bytes <= 1_000, "size {} over limit", stats.size_bytes);
    }

    #[tokio::test]
    async fn test_put_rejects_unrepresentable_expiry() {
        let (cache, _) = cache_with_clock(0);

        let ttl = Duration::from_secs(10_000_000_000_000);
        assert!(cache.put("k", Bytes::from_static(b"v"), "", ttl).await.is_none());
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.stats().await.puts, 0);
    }

    #[tokio::test]
    async fn test_stale_drop_keeps_replacement() {
        let (cache, clock) = cache_with_clock(0);

        cache.put("k", Bytes::from_static(b"old"), "", Duration::from_secs(10)).await;
        let stale = cache.store.get("k").await.unwrap();
        clock.advance(ChronoDuration::seconds(11));
        cache.put("k", Bytes::from_static(b"new"), "", TTL).await;

        // A reader that saw the old entry finishes after the replacement
        cache.drop_stale("k", stale.created_at).await;

        assert_eq!(cache.get("k").await.unwrap().data, Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_expired_read_drops_entry() {
        let (cache, clock) = cache_with_clock(0);

        cache.put("k", Bytes::from_static(b"v"), "", Duration::from_secs(10)).await;
        clock.advance(ChronoDuration::seconds(11));
        assert!(cache.get("k").await.is_none());

        assert!(cache.store.get("k").await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_put_and_get() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(CostCache::new(0, clock.clone()));
        let mut tasks = Vec::new();

        for worker in 0..8u64 {
            let cache = cache.clone();
            let clock = clock.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..200u64 {
                    let key = format!("k{}", (i * 7 + worker) % 32);
                    if (i + worker) % 3 == 0 {
                        let size = ((i * 37 + worker * 11) % 200 + 1) as usize;
                        let ttl = Duration::from_secs((i + worker) % 5 + 1);
                        cache.put(&key, Bytes::from(vec![0u8; size]), "", ttl).await;
                    } else {
                        let before = clock.now();
                        if let Some(entry) = cache.get(&key).await {
                            assert!(entry.expires_at >= before, "expired entry served for {}", key);
                        }
                    }
                    if i % 20 == 0 {
                        clock.advance(ChronoDuration::milliseconds(100));
                    }
                    tokio::task::yield_now().await;
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }

        // Reads drop whatever expired; what is left must be accounted exactly
        let mut resident = 0;
        let mut count = 0;
        for k in 0..32 {
            if let Some(entry) = cache.get(&format!("k{}", k)).await {
                resident += entry.cost();
                count += 1;
            }
        }

        cache.store.run_pending_tasks().await;
        let stats = cache.stats().await;
        assert_eq!(stats.size_bytes, resident);
        assert_eq!(stats.entries, count);
    }
}
