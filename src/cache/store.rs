//! Cache Store Module
//!
//! Keyed store of prepared folder payloads with lazy TTL expiration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{current_timestamp_ms, CacheEntry, CacheStats, DEFAULT_TTL_SECS};
use crate::error::{Result, ToolError};

// == Cache Store ==
/// Payload cache keyed by cache id.
///
/// Expiry is enforced when an entry is looked up or swept, never by a
/// timer inside the store. Entries are stored behind `Arc` so readers can
/// serialize a payload without copying it.
#[derive(Debug)]
pub struct CacheStore {
    entries: HashMap<String, Arc<CacheEntry>>,
    stats: CacheStats,
    /// Maximum entry age in milliseconds
    ttl_ms: u64,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store whose entries live for `ttl_secs` seconds.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            ttl_ms: ttl_secs.saturating_mul(1000),
        }
    }

    /// Configured TTL in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_ms / 1000
    }

    // == Put ==
    /// Inserts a fully built entry under its own id.
    ///
    /// An existing entry with the same id is replaced.
    pub fn put(&mut self, entry: CacheEntry) -> Arc<CacheEntry> {
        let entry = Arc::new(entry);
        if self
            .entries
            .insert(entry.cache_id.clone(), Arc::clone(&entry))
            .is_some()
        {
            debug!("Replaced cache entry {}", entry.cache_id);
        }
        self.stats.set_total_entries(self.entries.len());
        entry
    }

    // == Get ==
    /// Retrieves a live entry, evicting it first if it has expired.
    pub fn get(&mut self, id: &str) -> Result<Arc<CacheEntry>> {
        self.get_at(id, current_timestamp_ms())
    }

    /// Same as [`CacheStore::get`] with an explicit clock reading.
    pub fn get_at(&mut self, id: &str, now_ms: u64) -> Result<Arc<CacheEntry>> {
        let Some(entry) = self.entries.get(id) else {
            self.stats.record_miss();
            return Err(ToolError::NotFound(format!("cache id {}", id)));
        };

        if entry.is_expired_at(self.ttl_ms, now_ms) {
            let age_secs = entry.age_ms(now_ms) / 1000;
            self.entries.remove(id);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
            debug!("Evicted expired cache entry {} (age {}s)", id, age_secs);
            return Err(ToolError::Expired {
                id: id.to_string(),
                age_secs,
            });
        }

        self.stats.record_hit();
        Ok(Arc::clone(entry))
    }

    // == Delete ==
    /// Removes an entry by id.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        if self.entries.remove(id).is_some() {
            self.stats.set_total_entries(self.entries.len());
            Ok(())
        } else {
            Err(ToolError::NotFound(format!("cache id {}", id)))
        }
    }

    // == Sweep ==
    /// Removes every expired entry and returns how many were removed.
    pub fn sweep(&mut self) -> usize {
        self.sweep_at(current_timestamp_ms())
    }

    /// Same as [`CacheStore::sweep`] with an explicit clock reading.
    pub fn sweep_at(&mut self, now_ms: u64) -> usize {
        let ttl_ms = self.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_expired_at(ttl_ms, now_ms));
        let removed = before - self.entries.len();

        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Clear ==
    /// Drops every entry regardless of age. Used on teardown.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.stats.set_total_entries(0);
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Ids currently held, expired or not.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}
