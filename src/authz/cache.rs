//! Two-level permission cache.
//!
//! Level 1 lives inside a single access session (one logical request) and
//! is never version-checked after it is populated. Level 2 is process-wide
//! and shared across requests; every entry carries the permissions version
//! observed when it was written, and a stale stamp simply means the entry
//! is ignored. Level 2 is best-effort throughout: a failing backend
//! degrades to recomputation, never to an error.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::resolver::ResolvedRights;

/// Cache key for one (user, context) pair.
pub fn cache_key(user_id: i64, context_id: Option<i64>) -> String {
    match context_id {
        Some(context_id) => format!("{user_id}:{context_id}"),
        None => format!("{user_id}:global"),
    }
}

/// Version-stamped cache payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRights {
    pub version: i64,
    pub rights: ResolvedRights,
}

/// Process-wide shared cache backend.
///
/// Implementations must swallow their own failures: `fetch` answers `None`
/// and `store` becomes a no-op when the backend misbehaves.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn fetch(&self, key: &str) -> Option<CachedRights>;
    async fn store(&self, key: &str, entry: &CachedRights);
}

/// In-process shared cache. Entries are kept serialized so the payload
/// round-trips exactly the way an external backend would force it to.
#[derive(Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedCache for InMemoryCache {
    async fn fetch(&self, key: &str) -> Option<CachedRights> {
        let entries = self.entries.read().await;
        let raw = entries.get(key)?;
        match serde_json::from_str(raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("Discarding undecodable cache entry for {key}: {e}");
                None
            }
        }
    }

    async fn store(&self, key: &str, entry: &CachedRights) {
        match serde_json::to_string(entry) {
            Ok(raw) => {
                self.entries.write().await.insert(key.to_string(), raw);
            }
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry for {key}: {e}");
            }
        }
    }
}

/// Disabled shared cache for level-1-only deployments.
pub struct NoopCache;

#[async_trait]
impl SharedCache for NoopCache {
    async fn fetch(&self, _key: &str) -> Option<CachedRights> {
        None
    }

    async fn store(&self, _key: &str, _entry: &CachedRights) {}
}

/// Request-scope cache. Once an entry lands here it is considered fresh
/// for the remainder of the session.
#[derive(Debug, Default)]
pub struct RequestCache {
    entries: HashMap<String, ResolvedRights>,
}

impl RequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedRights> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, rights: ResolvedRights) -> &ResolvedRights {
        self.entries.entry(key).or_insert(rights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::resolver::RightValue;
    use rust_decimal_macros::dec;

    fn sample_rights() -> ResolvedRights {
        let mut map = HashMap::new();
        map.insert("view_article".to_string(), RightValue::Boolean(true));
        map.insert("approve_budget".to_string(), RightValue::Range(dec!(42.50)));
        ResolvedRights(map)
    }

    #[test]
    fn test_cache_key_shapes() {
        assert_eq!(cache_key(7, Some(3)), "7:3");
        assert_eq!(cache_key(7, None), "7:global");
    }

    #[tokio::test]
    async fn test_in_memory_cache_roundtrip() {
        let cache = InMemoryCache::new();
        let entry = CachedRights {
            version: 12,
            rights: sample_rights(),
        };

        assert!(cache.fetch("7:3").await.is_none());
        cache.store("7:3", &entry).await;

        let fetched = cache.fetch("7:3").await.unwrap();
        assert_eq!(fetched, entry);
        assert_eq!(
            fetched.rights.get("approve_budget").unwrap().as_decimal(),
            Some(dec!(42.50))
        );
    }

    #[tokio::test]
    async fn test_in_memory_cache_last_writer_wins() {
        let cache = InMemoryCache::new();
        let old = CachedRights {
            version: 1,
            rights: ResolvedRights::default(),
        };
        let new = CachedRights {
            version: 2,
            rights: sample_rights(),
        };

        cache.store("7:global", &old).await;
        cache.store("7:global", &new).await;
        assert_eq!(cache.fetch("7:global").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_noop_cache_never_stores() {
        let cache = NoopCache;
        let entry = CachedRights {
            version: 1,
            rights: sample_rights(),
        };
        cache.store("7:3", &entry).await;
        assert!(cache.fetch("7:3").await.is_none());
    }

    #[test]
    fn test_request_cache_insert_and_get() {
        let mut cache = RequestCache::new();
        assert!(cache.get("7:3").is_none());

        cache.insert("7:3".to_string(), sample_rights());
        assert!(cache.get("7:3").unwrap().has("view_article"));

        // A second insert for the same key keeps the existing entry.
        cache.insert("7:3".to_string(), ResolvedRights::default());
        assert!(cache.get("7:3").unwrap().has("view_article"));
    }
}
