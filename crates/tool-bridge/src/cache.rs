use dashmap::DashMap;
use std::time::Instant;
use trading_core::ToolCacheEntry;

const DEFAULT_CAPACITY: usize = 500;
const MAX_EXPIRED_SWEEP: usize = 10;

struct Entry {
    tool_name: String,
    inner: ToolCacheEntry,
}

pub struct ToolCache {
    entries: DashMap<String, Entry>,
    capacity: usize,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl ToolCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        use std::sync::atomic::Ordering;
        if let Some(entry) = self.entries.get(key) {
            if Instant::now() < entry.inner.expires_at {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.inner.value.clone());
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put(&self, key: String, tool_name: &str, value: serde_json::Value, ttl: std::time::Duration) {
        let now = Instant::now();
        self.entries.insert(
            key,
            Entry {
                tool_name: tool_name.to_string(),
                inner: ToolCacheEntry {
                    value,
                    inserted_at: now,
                    expires_at: now + ttl,
                },
            },
        );
        self.evict_if_over_capacity();
    }

    /// Drop every cached result produced by `tool_name`. Called after a
    /// mutating tool call succeeds against its declared invalidation set.
    pub fn invalidate_tool(&self, tool_name: &str) {
        self.entries.retain(|_, entry| entry.tool_name != tool_name);
    }

    fn evict_if_over_capacity(&self) {
        if self.entries.len() <= self.capacity {
            return;
        }

        let now = Instant::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| now >= e.inner.expires_at)
            .take(MAX_EXPIRED_SWEEP)
            .map(|e| e.key().clone())
            .collect();
        for key in expired {
            self.entries.remove(&key);
        }

        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.inner.inserted_at)
                .map(|e| e.key().clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        use std::sync::atomic::Ordering;
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = ToolCache::new();
        cache.put(
            "k".into(),
            "get_profile",
            serde_json::json!({"a": 1}),
            Duration::from_millis(1),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn fresh_entry_is_a_hit() {
        let cache = ToolCache::new();
        cache.put(
            "k".into(),
            "get_profile",
            serde_json::json!({"a": 1}),
            Duration::from_secs(60),
        );
        assert_eq!(cache.get("k"), Some(serde_json::json!({"a": 1})));
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn invalidate_tool_drops_only_matching_entries() {
        let cache = ToolCache::new();
        cache.put("k1".into(), "list_tasks", serde_json::json!([]), Duration::from_secs(60));
        cache.put("k2".into(), "get_profile", serde_json::json!({}), Duration::from_secs(60));

        cache.invalidate_tool("list_tasks");

        assert!(cache.get("k1").is_none());
        assert!(cache.get("k2").is_some());
    }

    #[test]
    fn eviction_drops_expired_before_oldest() {
        let cache = ToolCache::with_capacity(2);
        cache.put("expired".into(), "get_a", serde_json::json!(1), Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(5));
        cache.put("fresh1".into(), "get_b", serde_json::json!(2), Duration::from_secs(60));
        cache.put("fresh2".into(), "get_c", serde_json::json!(3), Duration::from_secs(60));

        assert!(cache.stats().size <= 2);
        assert!(cache.get("expired").is_none());
    }
}
