//! In-process key/value cache in front of list queries.
//!
//! Entries carry a per-entry TTL; expired entries are dropped on access
//! and swept on writes. The
//! cache is strictly advisory: every method degrades to a miss or a no-op
//! on any internal problem, so a cache failure can never fail a request.
//! Writers invalidate; readers may observe an entry that is at most one
//! TTL stale.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

/// Shared cache handle. Cloning is cheap; all clones see the same map.
#[derive(Clone, Default)]
pub struct Cache {
    entries: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key. Expired entries count as a miss and are removed.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value under `key`. Writes double as the sweep that keeps
    /// the map from accumulating expired entries on a long-lived process.
    pub fn put(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        let now = Instant::now();
        entries.retain(|_, entry| now < entry.expires_at);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }

    /// Drop every key starting with `prefix`. Used on writes that can
    /// affect an unknown set of cached pages (any post mutation drops the
    /// whole `posts:` family).
    pub fn invalidate_prefix(&self, prefix: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|key, _| !key.starts_with(prefix));
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_then_get() {
        let cache = Cache::new();
        cache.put("k", json!({"a": 1}), Duration::from_secs(60));
        assert_eq!(cache.get("k"), Some(json!({"a": 1})));
    }

    #[test]
    fn missing_key_is_none() {
        let cache = Cache::new();
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = Cache::new();
        cache.put("k", json!(1), Duration::from_secs(0));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn invalidate_removes_key() {
        let cache = Cache::new();
        cache.put("k", json!(1), Duration::from_secs(60));
        cache.invalidate("k");
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn invalidate_prefix_removes_family_only() {
        let cache = Cache::new();
        cache.put("posts:page=1", json!(1), Duration::from_secs(60));
        cache.put("posts:page=2", json!(2), Duration::from_secs(60));
        cache.put("workouts:u1:page=1", json!(3), Duration::from_secs(60));

        cache.invalidate_prefix("posts:");

        assert_eq!(cache.get("posts:page=1"), None);
        assert_eq!(cache.get("posts:page=2"), None);
        assert_eq!(cache.get("workouts:u1:page=1"), Some(json!(3)));
    }

    #[test]
    fn put_sweeps_expired_entries() {
        let cache = Cache::new();
        cache.put("dead", json!(1), Duration::from_secs(0));
        cache.put("live", json!(2), Duration::from_secs(60));

        let entries = cache.entries.lock().unwrap();
        assert!(!entries.contains_key("dead"));
        assert!(entries.contains_key("live"));
    }

    #[test]
    fn clones_share_the_same_map() {
        let cache = Cache::new();
        let clone = cache.clone();
        cache.put("k", json!(1), Duration::from_secs(60));
        assert_eq!(clone.get("k"), Some(json!(1)));
    }
}
