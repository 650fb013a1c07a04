//! Capability lookup by object type.

use std::collections::HashMap;
use std::sync::Arc;

use super::{AdditionalFieldsProvider, CacheInvalidator, PostSaveHook, PreSaveHook};
use crate::cache::{CacheStore, RECORD_ENTITY, object_tag};
use crate::models::{ObjectRecord, ObjectTypeId};

/// Returns the cache tag of one record, e.g. `ObjectRecord[3:12]`.
#[must_use]
pub fn record_tag(object_type_id: ObjectTypeId, record_id: i64) -> String {
    object_tag(RECORD_ENTITY, format!("{object_type_id}:{record_id}"))
}

/// The hooks one record type implements.
#[derive(Clone, Default)]
pub struct RecordCapabilities {
    /// Pre-save normalization.
    pub pre_save: Option<Arc<dyn PreSaveHook>>,
    /// Post-save follow-up.
    pub post_save: Option<Arc<dyn PostSaveHook>>,
    /// Cache invalidation.
    pub cache_invalidator: Option<Arc<dyn CacheInvalidator>>,
    /// Computed export columns.
    pub additional_fields: Option<Arc<dyn AdditionalFieldsProvider>>,
}

impl RecordCapabilities {
    /// Creates an empty capability set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the pre-save hook.
    #[must_use]
    pub fn with_pre_save(mut self, hook: Arc<dyn PreSaveHook>) -> Self {
        self.pre_save = Some(hook);
        self
    }

    /// Sets the post-save hook.
    #[must_use]
    pub fn with_post_save(mut self, hook: Arc<dyn PostSaveHook>) -> Self {
        self.post_save = Some(hook);
        self
    }

    /// Sets the cache invalidator.
    #[must_use]
    pub fn with_cache_invalidator(mut self, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        self.cache_invalidator = Some(invalidator);
        self
    }

    /// Sets the additional fields provider.
    #[must_use]
    pub fn with_additional_fields(mut self, provider: Arc<dyn AdditionalFieldsProvider>) -> Self {
        self.additional_fields = Some(provider);
        self
    }
}

impl std::fmt::Debug for RecordCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCapabilities")
            .field("pre_save", &self.pre_save.is_some())
            .field("post_save", &self.post_save.is_some())
            .field("cache_invalidator", &self.cache_invalidator.is_some())
            .field("additional_fields", &self.additional_fields.is_some())
            .finish()
    }
}

/// Maps object types to their record capabilities.
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    by_type: HashMap<ObjectTypeId, RecordCapabilities>,
    none: RecordCapabilities,
}

impl HookRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the capabilities of an object type, replacing earlier ones.
    pub fn register(&mut self, object_type_id: ObjectTypeId, capabilities: RecordCapabilities) {
        self.by_type.insert(object_type_id, capabilities);
    }

    /// Builder form of [`Self::register`].
    #[must_use]
    pub fn with(mut self, object_type_id: ObjectTypeId, capabilities: RecordCapabilities) -> Self {
        self.register(object_type_id, capabilities);
        self
    }

    /// Returns the capabilities of an object type (empty if none registered).
    #[must_use]
    pub fn capabilities(&self, object_type_id: ObjectTypeId) -> &RecordCapabilities {
        self.by_type.get(&object_type_id).unwrap_or(&self.none)
    }
}

/// Invalidates the record's own tag.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordTagInvalidator;

impl CacheInvalidator for RecordTagInvalidator {
    fn invalidate(&self, record: &ObjectRecord, cache: &dyn CacheStore) {
        let removed = cache.invalidate_tag(&record_tag(record.object_type_id, record.id));
        tracing::debug!(
            object_type = %record.object_type_id,
            record_id = record.id,
            removed,
            "Invalidated record cache tag"
        );
    }
}
