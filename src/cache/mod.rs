//! Tag-invalidated caching.
//!
//! Derived data (resolved field sets, static value lists) is cached under a
//! key together with a set of tags. Mutations invalidate the tags they touch,
//! synchronously, before anything can read the affected entries again.
//!
//! # Tags
//!
//! | Helper | Example | Invalidated when |
//! |--------|---------|------------------|
//! | [`object_tag`] | `Property[12]` | that single entity changes |
//! | [`common_tag`] | `Property` | any entity of the kind changes |

mod memory;

pub use memory::MemoryCache;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Entity name used in tags for object types.
pub const OBJECT_TYPE_ENTITY: &str = "ObjectType";
/// Entity name used in tags for property groups.
pub const PROPERTY_GROUP_ENTITY: &str = "PropertyGroup";
/// Entity name used in tags for properties.
pub const PROPERTY_ENTITY: &str = "Property";
/// Entity name used in tags for object records.
pub const RECORD_ENTITY: &str = "ObjectRecord";

/// Key/value store with tag-based invalidation.
///
/// Values are JSON documents so a single store can hold any serializable
/// lookup result. Implementations must be thread-safe (`Send + Sync`).
pub trait CacheStore: Send + Sync {
    /// Returns the cached value for a key, if present and not expired.
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Stores a value with an optional time-to-live and a set of tags.
    fn set(&self, key: &str, value: serde_json::Value, ttl: Option<Duration>, tags: &[String]);

    /// Drops every entry carrying the tag.
    ///
    /// Returns the number of entries removed.
    fn invalidate_tag(&self, tag: &str) -> usize;

    /// Drops every entry carrying any of the tags.
    fn invalidate_tags(&self, tags: &[String]) -> usize {
        tags.iter().map(|tag| self.invalidate_tag(tag)).sum()
    }
}

/// Returns the tag identifying one entity instance, e.g. `Property[12]`.
#[must_use]
pub fn object_tag(entity: &str, id: impl std::fmt::Display) -> String {
    format!("{entity}[{id}]")
}

/// Returns the tag covering every instance of an entity kind.
#[must_use]
pub fn common_tag(entity: &str) -> String {
    entity.to_string()
}

/// Reads and deserializes a cached value.
///
/// Entries that no longer deserialize are treated as misses.
pub fn get_typed<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    let value = cache.get(key)?;
    match serde_json::from_value(value) {
        Ok(typed) => Some(typed),
        Err(e) => {
            tracing::debug!(key, error = %e, "Discarding undecodable cache entry");
            None
        },
    }
}

/// Serializes and stores a value.
pub fn set_typed<T: Serialize>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
    tags: &[String],
) {
    match serde_json::to_value(value) {
        Ok(json) => cache.set(key, json, ttl, tags),
        Err(e) => tracing::warn!(key, error = %e, "Failed to serialize cache entry"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        assert_eq!(object_tag(PROPERTY_ENTITY, 12), "Property[12]");
        assert_eq!(common_tag(PROPERTY_GROUP_ENTITY), "PropertyGroup");
    }

    #[test]
    fn test_typed_round_trip() {
        let cache = MemoryCache::new(8);
        set_typed(&cache, "k", &vec![1, 2, 3], None, &[]);
        let back: Option<Vec<i32>> = get_typed(&cache, "k");
        assert_eq!(back, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_typed_mismatch_is_a_miss() {
        let cache = MemoryCache::new(8);
        set_typed(&cache, "k", &"text", None, &[]);
        let back: Option<Vec<i32>> = get_typed(&cache, "k");
        assert!(back.is_none());
    }
}
