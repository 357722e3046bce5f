//! Cache Sweep Task
//!
//! Background task that periodically expires and evicts entries from the
//! size-bounded memory cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::MemoryCache;

/// Spawns a background task that sweeps `cache` every `interval`.
///
/// The sweep takes the cache's write lock for its duration, so it is
/// serialized with puts and reads.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(MemoryCache::new(50_000_000, Arc::new(SystemClock)));
/// let sweep_handle = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<MemoryCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting cache sweep task with interval of {} seconds",
            interval.as_secs()
        );

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let report = cache.sweep().await;

            if report.expired > 0 || report.evicted > 0 {
                info!(
                    expired = report.expired,
                    evicted = report.evicted,
                    size = report.size_bytes,
                    limit = cache.limit_bytes(),
                    "cache sweep removed entries"
                );
            } else {
                debug!(size = report.size_bytes, "cache sweep: nothing to remove");
            }
        }
    })
}
