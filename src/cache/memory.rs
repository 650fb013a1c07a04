//! In-process LRU cache with TTL expiry and tag invalidation.

use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::CacheStore;

/// Entry in the cache.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    expires_at: Option<Instant>,
    tags: Vec<String>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<String, CacheEntry>,
    /// Tag → keys carrying it.
    tags: HashMap<String, HashSet<String>>,
}

impl Inner {
    fn forget(&mut self, key: &str, entry: &CacheEntry) {
        for tag in &entry.tags {
            if let Some(keys) = self.tags.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }
    }
}

/// Bounded in-memory [`CacheStore`].
///
/// # Lock Poisoning
///
/// A poisoned lock is recovered, so invalidations keep applying after a
/// panicking writer.
///
/// # Example
///
/// ```rust,ignore
/// use eavio::cache::{CacheStore, MemoryCache};
///
/// let cache = MemoryCache::new(1024);
/// cache.set("fields:3", json, None, &["ObjectType[3]".to_string()]);
/// cache.invalidate_tag("ObjectType[3]");
/// assert!(cache.get("fields:3").is_none());
/// ```
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<Inner>,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(cap),
                tags: HashMap::new(),
            }),
        }
    }

    /// Returns the number of live entries (expired ones may still be counted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Cache mutex was poisoned, recovering");
                poisoned.into_inner()
            },
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired && let Some(entry) = inner.entries.pop(key) {
            inner.forget(key, &entry);
            tracing::trace!(key, "Cache entry expired");
        }
        None
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>, tags: &[String]) {
        let mut inner = self.lock();
        let entry = CacheEntry {
            value,
            expires_at: ttl.map(|t| Instant::now() + t),
            tags: tags.to_vec(),
        };

        // push returns either the previous value for this key or the evicted LRU entry
        if let Some((old_key, old_entry)) = inner.entries.push(key.to_string(), entry) {
            inner.forget(&old_key, &old_entry);
        }
        for tag in tags {
            inner
                .tags
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
    }

    fn invalidate_tag(&self, tag: &str) -> usize {
        let mut inner = self.lock();
        let Some(keys) = inner.tags.remove(tag) else {
            return 0;
        };

        let mut removed = 0;
        for key in keys {
            if let Some(entry) = inner.entries.pop(&key) {
                inner.forget(&key, &entry);
                removed += 1;
            }
        }
        tracing::debug!(tag, removed, "Invalidated cache tag");
        removed
    }
}
