//! # Result Cache
//!
//! Process-local TTL cache for access-layer results. Values are stored as JSON so
//! one cache can hold listings and records side by side. Expired entries are
//! evicted lazily on read and in bulk by [`ResultCache::cleanup`], which can also
//! run on a background task.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::CacheConfig;

/// Stand-in expiry for TTLs too large to represent as an `Instant`
const NEVER_EXPIRES: Duration = Duration::from_secs(86_400 * 365 * 30);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

impl CacheStats {
    pub fn hit_rate_display(&self) -> String {
        format!("{:.1}%", self.hit_rate_percent)
    }
}

#[derive(Debug)]
pub struct ResultCache {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl())
    }

    /// Unexpired value for `key`; a stale entry counts as a miss and is evicted
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Typed read; an entry that no longer deserializes is dropped and treated as a miss
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                warn!(key, error = %e, "Dropping undecodable cache entry");
                self.delete(key);
                None
            }
        }
    }

    /// Store `value`, expiring after `ttl` or the default TTL
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value, ttl: Option<Duration>) {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl.unwrap_or(self.default_ttl))
            .unwrap_or_else(|| now + NEVER_EXPIRES);
        self.entries
            .lock()
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    pub fn set_as<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.set(key, value, ttl);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Purge every expired entry, returning how many were removed
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "🧹 Cache cleanup");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            size: self.len(),
            hits,
            misses,
            hit_rate_percent: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64 * 100.0
            },
        }
    }

    /// Run [`cleanup`](Self::cleanup) every `interval` until the handle is aborted
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                cache.cleanup();
            }
        })
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = ResultCache::new(Duration::from_secs(10));
        cache.set("k", json!({"v": 1}), Some(Duration::from_secs(1)));
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));

        tokio::time::advance(Duration::from_millis(1_100)).await;
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_counts_only_expired_entries() {
        let cache = ResultCache::new(Duration::from_secs(10));
        cache.set("short", json!(1), Some(Duration::from_secs(1)));
        cache.set("long", json!(2), None);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.delete("long"));
        assert!(!cache.delete("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_cleanup_purges() {
        let cache = Arc::new(ResultCache::new(Duration::from_secs(1)));
        cache.set("k", json!("v"), None);
        let handle = cache.spawn_cleanup_task(Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(cache.len(), 0);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_is_clamped() {
        let cache = ResultCache::new(Duration::from_secs(10));
        cache.set("forever", json!(1), Some(Duration::MAX));

        tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        assert_eq!(cache.get("forever"), Some(json!(1)));
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn test_stats_track_hit_rate() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set_as("ids", &vec!["release:a"], None).unwrap();
        assert_eq!(cache.get_as::<Vec<String>>("ids").unwrap(), vec!["release:a"]);
        assert!(cache.get("missing").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate_display(), "50.0%");

        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }
}
