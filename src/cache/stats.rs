//! Cache Statistics Module
//!
//! Tracks hits, misses and puts with atomic counters so readers of
//! different keys never serialize on bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Counters ==
/// Live counters shared by a cache implementation.
#[derive(Debug)]
pub struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    puts: AtomicU64,
    since: DateTime<Utc>,
}

impl Counters {
    /// Creates zeroed counters, with uptime measured from `since`.
    pub fn new(since: DateTime<Utc>) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            puts: AtomicU64::new(0),
            since,
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_put(&self) {
        self.puts.fetch_add(1, Ordering::Relaxed);
    }

    // == Snapshot ==
    /// Freezes the counters together with the store's size figures.
    pub fn snapshot(&self, entries: u64, size_bytes: u64, now: DateTime<Utc>) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            puts: self.puts.load(Ordering::Relaxed),
            entries,
            size_bytes,
            since: self.since.to_rfc3339(),
            uptime_seconds: (now - self.since).num_seconds().max(0) as u64,
        }
    }
}

// == Cache Stats ==
/// Read-only statistics snapshot.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStats {
    /// Number of lookups served from the cache
    pub hits: u64,
    /// Number of lookups that found nothing or an expired entry
    pub misses: u64,
    /// Number of accepted stores
    pub puts: u64,
    /// Current number of entries
    pub entries: u64,
    /// Total byte cost of all entries
    pub size_bytes: u64,
    /// When the cache was created (RFC 3339)
    pub since: String,
    /// Seconds since creation
    pub uptime_seconds: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_counters_new() {
        let now = Utc::now();
        let stats = Counters::new(now).snapshot(0, 0, now);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.puts, 0);
        assert_eq!(stats.uptime_seconds, 0);
    }

    #[test]
    fn test_counters_record() {
        let now = Utc::now();
        let counters = Counters::new(now);
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        counters.record_put();

        let stats = counters.snapshot(3, 42, now + ChronoDuration::seconds(90));
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.size_bytes, 42);
        assert_eq!(stats.uptime_seconds, 90);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
    }
}
