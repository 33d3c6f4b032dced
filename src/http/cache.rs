//! Response cache
//!
//! An explicit cache handle injected into the executor. Entries are keyed by
//! method, URL and sorted query parameters. Only successful GET responses are
//! stored, and they live as long as the process.

use crate::pagination::PageResponse;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Storage for previously fetched pages
pub trait ResponseCache: Send + Sync {
    /// Look up a fresh entry
    fn get(&self, key: &str) -> Option<PageResponse>;

    /// Store a response
    fn put(&self, key: String, response: &PageResponse);
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: PageResponse,
    stored_at: Instant,
}

/// In-process cache with optional time-to-live
#[derive(Debug, Default)]
pub struct MemoryResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    expire_after: Option<Duration>,
}

impl MemoryResponseCache {
    /// Create a cache whose entries never expire
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache whose entries expire after `ttl`
    pub fn with_expiry(ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            expire_after: ttl,
        }
    }

    /// Number of stored entries not yet evicted
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.expire_after
            .is_none_or(|ttl| entry.stored_at.elapsed() < ttl)
    }
}

impl ResponseCache for MemoryResponseCache {
    fn get(&self, key: &str) -> Option<PageResponse> {
        {
            let entries = self.entries.read().ok()?;
            match entries.get(key) {
                None => return None,
                Some(entry) if self.is_fresh(entry) => return Some(entry.response.clone()),
                Some(_) => {}
            }
        }

        // Stale: evict unless another writer refreshed it meanwhile.
        if let Ok(mut entries) = self.entries.write() {
            if entries.get(key).is_some_and(|entry| !self.is_fresh(entry)) {
                entries.remove(key);
            }
        }
        None
    }

    fn put(&self, key: String, response: &PageResponse) {
        if let Ok(mut entries) = self.entries.write() {
            if self.expire_after.is_some() {
                entries.retain(|_, entry| self.is_fresh(entry));
            }
            entries.insert(
                key,
                CacheEntry {
                    response: response.clone(),
                    stored_at: Instant::now(),
                },
            );
        }
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use serde_json::json;

    fn response() -> PageResponse {
        PageResponse::new(200, HeaderMap::new(), json!({"teams": []}))
    }

    #[test]
    fn test_get_put() {
        let cache = MemoryResponseCache::new();
        assert!(cache.get("k").is_none());

        cache.put("k".to_string(), &response());
        assert_eq!(cache.get("k").unwrap().body, json!({"teams": []}));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_expired_entries_are_evicted_on_get() {
        let cache = MemoryResponseCache::with_expiry(Some(Duration::ZERO));
        cache.put("k".to_string(), &response());
        assert_eq!(cache.len(), 1);

        assert!(cache.get("k").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_purges_expired_entries() {
        let cache = MemoryResponseCache::with_expiry(Some(Duration::ZERO));
        cache.put("a".to_string(), &response());
        cache.put("b".to_string(), &response());
        cache.put("c".to_string(), &response());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_without_expiry_stay() {
        let cache = MemoryResponseCache::new();
        cache.put("a".to_string(), &response());
        cache.put("b".to_string(), &response());
        assert!(cache.get("a").is_some());
        assert_eq!(cache.len(), 2);
    }
}
