//! Cache Module
//!
//! Response caching with TTL expiration and byte-capacity bounds, behind a
//! single `Cache` trait with two interchangeable backends.

mod clock;
mod cost;
mod entry;
mod eviction;
mod memory;
mod stats;


use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use bytes::Bytes;
use chrono::{DateTime, Utc};

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use cost::CostCache;
pub use entry::CacheEntry;
pub use eviction::EvictionQueue;
pub use memory::{MemoryCache, SweepReport};
pub use stats::{CacheStats, Counters};

// == Cache Trait ==
/// A concurrent response cache.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Stores `data` under `key` for `ttl`.
    ///
    /// Returns the expiry time, or `None` when the entry was not accepted
    /// (zero TTL, an expiry past the representable range, or larger than
    /// the whole cache).
    async fn put(&self, key: &str, data: Bytes, content_type: &str, ttl: Duration) -> Option<DateTime<Utc>> {
        self.put_with_headers(key, data, content_type, HeaderMap::new(), ttl).await
    }

    /// Same as `put`, also keeping `headers` to replay on every hit.
    async fn put_with_headers(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        headers: HeaderMap,
        ttl: Duration,
    ) -> Option<DateTime<Utc>>;

    /// Looks up `key`, never returning an entry whose expiry has passed.
    async fn get(&self, key: &str) -> Option<CacheEntry>;
}

// == Backend Kind ==
/// Which cache implementation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// FIFO sweep over a byte-bounded map
    Memory,
    /// moka, weighted by byte cost
    #[default]
    Cost,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "cost" | "moka" => Ok(Self::Cost),
            other => Err(format!("unknown cache backend '{}'", other)),
        }
    }
}

// == Cache Backend ==
/// The configured cache, with access to its statistics side channel.
#[derive(Debug, Clone)]
pub enum CacheBackend {
    Memory(Arc<MemoryCache>),
    Cost(Arc<CostCache>),
}

impl CacheBackend {
    /// Builds the backend selected by `kind`.
    pub fn new(kind: BackendKind, limit_bytes: u64, clock: Arc<dyn Clock>) -> Self {
        match kind {
            BackendKind::Memory => Self::Memory(Arc::new(MemoryCache::new(limit_bytes, clock))),
            BackendKind::Cost => Self::Cost(Arc::new(CostCache::new(limit_bytes, clock))),
        }
    }

    /// The backend as a trait object for the proxy pipeline.
    pub fn as_cache(&self) -> Arc<dyn Cache> {
        match self {
            Self::Memory(cache) => cache.clone(),
            Self::Cost(cache) => cache.clone(),
        }
    }

    /// The memory backend, which needs a sweep task.
    pub fn memory(&self) -> Option<Arc<MemoryCache>> {
        match self {
            Self::Memory(cache) => Some(cache.clone()),
            Self::Cost(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Cost(_) => "cost",
        }
    }

    pub async fn stats(&self) -> CacheStats {
        match self {
            Self::Memory(cache) => cache.stats().await,
            Self::Cost(cache) => cache.stats().await,
        }
    }
}
