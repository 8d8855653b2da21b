use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    stored_at: Instant,
    pub cached_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
            stored_at: Instant::now(),
            cached_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// An entry exactly `ttl` old is already stale.
    pub fn is_stale(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age().as_secs() / 60;
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Keyed TTL store for raw responses.
///
/// Owned by a single service; keys never interact and concurrent fetches of
/// the same key are not deduplicated.
pub struct CacheStore<V = Value> {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value, or `None` if absent or stale. Stale entries
    /// are evicted on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_stale(self.ttl) => {
                debug!(key, age_ms = entry.age().as_millis() as u64, "Cache entry stale, evicting");
                entries.remove(key);
                None
            }
            Some(entry) => {
                trace!(key, "Cache hit");
                Some(entry.value.clone())
            }
            None => {
                trace!(key, "Cache miss");
                None
            }
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry::new(key, value);
        self.entries.lock().insert(entry.key.clone(), entry);
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    /// Drop every entry whose key starts with `prefix`.
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries, stale ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable age of a live entry, for status lines.
    pub fn age_display(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|entry| !entry.is_stale(self.ttl))
            .map(CacheEntry::age_display)
    }
}

impl<V: Clone> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get_within_ttl() {
        let cache = CacheStore::new(Duration::from_secs(30));
        cache.set("accounts:/stats", json!({"total": 3}));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(cache.get("accounts:/stats"), Some(json!({"total": 3})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_misses_at_exactly_ttl() {
        let cache = CacheStore::new(Duration::from_secs(30));
        cache.set("k", json!(1));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get("k"), None);
        // Evicted on read
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_resets_age() {
        let cache = CacheStore::new(Duration::from_secs(10));
        cache.set("k", json!("old"));
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", json!("new"));
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some(json!("new")));
    }

    #[test]
    fn test_keys_do_not_interact() {
        let cache: CacheStore<i32> = CacheStore::default();
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.remove("a"));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_remove_prefix_only_touches_matching_keys() {
        let cache: CacheStore<i32> = CacheStore::default();
        cache.set("/accounts:/1", 1);
        cache.set("/accounts:/2", 2);
        cache.set("/events:/1", 3);

        assert_eq!(cache.remove_prefix("/accounts:"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("/events:/1"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_age_display() {
        let cache = CacheStore::new(Duration::from_secs(24 * 3600));
        cache.set("k", 0u8);
        assert_eq!(cache.age_display("k").as_deref(), Some("just now"));

        tokio::time::advance(Duration::from_secs(5 * 60)).await;
        assert_eq!(cache.age_display("k").as_deref(), Some("5m ago"));

        tokio::time::advance(Duration::from_secs(90 * 60)).await;
        assert_eq!(cache.age_display("k").as_deref(), Some("2h ago"));
        assert_eq!(cache.age_display("missing"), None);
    }
}
