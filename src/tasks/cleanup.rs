//! Expiry Sweep Task
//!
//! Optional background sweep of expired cache entries. Lookups already evict
//! expired entries lazily; the sweep only bounds memory held by entries
//! nobody asks for again.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a task that sweeps expired entries every `interval_secs` seconds.
///
/// Returns the task handle so shutdown can abort it.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(state.cache.clone(), 60);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: SharedCache, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting cache sweep task every {}s", interval.as_secs());

        loop {
            tokio::time::sleep(interval).await;

            let (removed, remaining) = {
                let mut store = cache.write().await;
                let removed = store.sweep();
                (removed, store.len())
            };

            if removed > 0 {
                info!("Cache sweep: removed {} expired entries, {} remain", removed, remaining);
            } else {
                debug!("Cache sweep: nothing expired");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{self, current_timestamp_ms, CacheEntry, CacheStore};
    use std::collections::BTreeMap;

    fn entry(id: &str, created_at: u64) -> CacheEntry {
        CacheEntry::new(id, "/tmp/src", Vec::new(), BTreeMap::new()).with_created_at(created_at)
    }

    #[tokio::test]
    async fn test_sweep_task_removes_expired_entries() {
        let cache = cache::shared(CacheStore::new(60));
        {
            let mut store = cache.write().await;
            store.put(entry("folder_old", current_timestamp_ms() - 120_000));
            store.put(entry("folder_new", current_timestamp_ms()));
        }

        let handle = spawn_cleanup_task(cache.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        {
            let store = cache.read().await;
            assert_eq!(store.ids(), vec!["folder_new".to_string()]);
            assert_eq!(store.stats().expirations, 1);
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_can_be_aborted() {
        let cache = cache::shared(CacheStore::new(60));

        let handle = spawn_cleanup_task(cache, 1);
        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
