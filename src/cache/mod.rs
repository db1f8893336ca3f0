//! In-memory result cache: generated schemas keyed by request path.
//!
//! Entries are written only after a successful download and schema
//! generation and are never evicted: the same path always names the same
//! upstream file, so a stored schema stays valid for the process lifetime.

use std::borrow::Borrow;
use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::RwLock;

/// A generated schema. Cloning shares the underlying buffer.
pub type Artifact = Bytes;

/// Identifies one cached artifact; built from the inbound request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Concurrent `CacheKey → Artifact` map.
///
/// Readers share a read lock and never wait on each other. A writer holds
/// the write lock only for the map insert itself; callers compute the
/// artifact before calling [`set`](Self::set).
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use values_schema::cache::ResultCache;
///
/// let cache = ResultCache::new();
/// assert!(cache.get("/org/repo/main/values.yaml").is_none());
///
/// cache.set("/org/repo/main/values.yaml".into(), Bytes::from_static(b"{}"));
/// assert_eq!(cache.get("/org/repo/main/values.yaml").unwrap(), "{}");
/// ```
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<CacheKey, Artifact>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the artifact stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<Artifact> {
        self.entries.read().get(key).cloned()
    }

    /// Stores `artifact` under `key`, replacing any previous value.
    pub fn set(&self, key: CacheKey, artifact: Artifact) {
        self.entries.write().insert(key, artifact);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of cached artifacts.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn missing_key_is_not_found() {
        let cache = ResultCache::new();
        assert!(cache.get("/a/values.yaml").is_none());
        assert!(!cache.contains("/a/values.yaml"));
        assert!(cache.is_empty());
    }

    #[test]
    fn last_write_wins() {
        let cache = ResultCache::new();
        cache.set("/k".into(), Bytes::from_static(b"first"));
        assert_eq!(cache.get("/k").unwrap(), Bytes::from_static(b"first"));

        cache.set("/k".into(), Bytes::from_static(b"second"));
        assert_eq!(cache.get("/k").unwrap(), Bytes::from_static(b"second"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_are_exact_strings() {
        let cache = ResultCache::new();
        cache.set("/org/repo/values.yaml".into(), Bytes::from_static(b"x"));
        assert!(cache.get("/org/repo/values.yaml/").is_none());
        assert!(cache.get("/Org/repo/values.yaml").is_none());
    }

    #[test]
    fn concurrent_writes_to_distinct_keys_are_all_kept() {
        let cache = Arc::new(ResultCache::new());
        let handles: Vec<_> = (0..16)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let key = format!("/t{t}/k{i}");
                        cache.set(key.clone().into(), Bytes::from(key));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 16 * 100);
        for t in 0..16 {
            for i in 0..100 {
                let key = format!("/t{t}/k{i}");
                assert_eq!(cache.get(&key).unwrap(), Bytes::from(key));
            }
        }
    }

    #[test]
    fn readers_see_whole_artifacts() {
        let cache = Arc::new(ResultCache::new());
        let small = Bytes::from(vec![b'a'; 16]);
        let large = Bytes::from(vec![b'b'; 64 * 1024]);
        cache.set("/k".into(), small.clone());

        let writer = {
            let cache = Arc::clone(&cache);
            let (small, large) = (small.clone(), large.clone());
            thread::spawn(move || {
                for i in 0..500 {
                    let next = if i % 2 == 0 { large.clone() } else { small.clone() };
                    cache.set("/k".into(), next);
                }
            })
        };

        for _ in 0..500 {
            let seen = cache.get("/k").unwrap();
            assert!(seen == small || seen == large);
        }
        writer.join().unwrap();
    }
}
