//! Cache Module
//!
//! Holds prepared folder payloads between `prepare_local_folder` and
//! `get_cached_data`, with TTL-based expiry.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use entry::{current_timestamp_ms, CacheEntry, FolderItem};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Default entry lifetime in seconds (one hour)
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Cache store shared between tool handlers, the API and the sweep task.
///
/// Every operation takes the lock for its whole duration, so reads and
/// writes of a single id are serialized and an insert can never interleave
/// with a sweep.
pub type SharedCache = Arc<RwLock<CacheStore>>;

/// Wraps a store for sharing.
pub fn shared(store: CacheStore) -> SharedCache {
    Arc::new(RwLock::new(store))
}
