//! Field resolution per object type.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{
    CacheStore, OBJECT_TYPE_ENTITY, PROPERTY_ENTITY, PROPERTY_GROUP_ENTITY, common_tag, get_typed,
    object_tag, set_typed,
};
use crate::models::{ObjectType, ObjectTypeId, ResolvedFields};
use crate::storage::{SchemaCatalog, Store};
use crate::{Error, Result};

/// Default lifetime of memoized field sets.
pub const DEFAULT_FIELD_TTL: Duration = Duration::from_secs(86_400);

/// Computes the importable/exportable fields of an object type.
///
/// Results are memoized in the cache under `fields:{object_type}` and
/// dropped whenever the object type, any property group or any property
/// changes.
pub struct FieldResolver {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl FieldResolver {
    /// Creates a resolver with the default TTL.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            cache,
            ttl: DEFAULT_FIELD_TTL,
        }
    }

    /// Sets the memoization TTL.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn cache_key(object_type_id: ObjectTypeId) -> String {
        format!("fields:{object_type_id}")
    }

    /// Resolves the fields of an object type.
    ///
    /// Object types without a record class resolve to an empty field set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the object type does not exist.
    pub fn resolve_fields(&self, object_type_id: ObjectTypeId) -> Result<ResolvedFields> {
        let key = Self::cache_key(object_type_id);
        if let Some(fields) = get_typed::<ResolvedFields>(self.cache.as_ref(), &key) {
            tracing::trace!(object_type = %object_type_id, "Field set served from cache");
            return Ok(fields);
        }

        let object_type = self
            .store
            .object_type(object_type_id)?
            .ok_or_else(|| Error::NotFound {
                entity: "object type",
                id: object_type_id.to_string(),
            })?;

        let fields = self.compute(&object_type)?;
        let tags = [
            object_tag(OBJECT_TYPE_ENTITY, object_type_id),
            common_tag(PROPERTY_GROUP_ENTITY),
            common_tag(PROPERTY_ENTITY),
        ];
        set_typed(self.cache.as_ref(), &key, &fields, Some(self.ttl), &tags);

        tracing::debug!(
            object_type = %object_type_id,
            object_fields = fields.object_fields.len(),
            property_fields = fields.property_fields.len(),
            "Resolved fields"
        );
        Ok(fields)
    }

    fn compute(&self, object_type: &ObjectType) -> Result<ResolvedFields> {
        if object_type.record_class.is_none() {
            return Ok(ResolvedFields::default());
        }

        let object_fields = object_type
            .attribute_names()
            .filter(|name| *name != ObjectType::ID_ATTRIBUTE)
            .map(String::from)
            .collect();

        let mut property_fields = Vec::new();
        for group in self.store.property_groups(object_type.id)? {
            for property in self.store.properties_for_group(group.id)? {
                property_fields.push(property.key);
            }
        }

        Ok(ResolvedFields {
            object_fields,
            property_fields,
            additional_fields: Vec::new(),
        })
    }

    /// Drops the memoized field set of an object type.
    pub fn invalidate(&self, object_type_id: ObjectTypeId) {
        self.cache
            .invalidate_tag(&object_tag(OBJECT_TYPE_ENTITY, object_type_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{AttributeDef, NewProperty, NewPropertyGroup};
    use crate::storage::SqliteStore;

    fn setup() -> (Arc<SqliteStore>, Arc<MemoryCache>, ObjectType) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ty = store
            .create_object_type(
                "Product",
                Some("catalog.Product"),
                &[
                    AttributeDef::new("id"),
                    AttributeDef::new("name"),
                    AttributeDef::new("price"),
                ],
            )
            .unwrap();
        (store, Arc::new(MemoryCache::new(64)), ty)
    }

    fn add_group(store: &SqliteStore, ty: &ObjectType, name: &str, keys: &[&str]) {
        let handler = store.create_handler("Text").unwrap();
        let group = store
            .create_property_group(&NewPropertyGroup {
                object_type_id: ty.id,
                name: name.to_string(),
                hidden: false,
            })
            .unwrap();
        for key in keys {
            store
                .create_property(&NewProperty::text_column(group.id, handler.id, key))
                .unwrap();
        }
    }

    #[test]
    fn test_resolve_fields_orders_groups_then_properties() {
        let (store, cache, ty) = setup();
        add_group(&store, &ty, "Main", &["color", "size"]);
        add_group(&store, &ty, "Extra", &["vendor"]);

        let resolver = FieldResolver::new(store, cache);
        let fields = resolver.resolve_fields(ty.id).unwrap();
        assert_eq!(fields.object_fields, vec!["name", "price"]);
        assert_eq!(fields.property_fields, vec!["color", "size", "vendor"]);
        assert!(fields.additional_fields.is_empty());
    }

    #[test]
    fn test_unknown_object_type() {
        let (store, cache, _) = setup();
        let resolver = FieldResolver::new(store, cache);
        assert!(matches!(
            resolver.resolve_fields(ObjectTypeId::new(99)),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_type_without_record_class_is_empty() {
        let (store, cache, _) = setup();
        let bare = store
            .create_object_type("Virtual", None, &[AttributeDef::new("id"), AttributeDef::new("x")])
            .unwrap();
        let resolver = FieldResolver::new(store, cache);
        assert!(resolver.resolve_fields(bare.id).unwrap().is_empty());
    }

    #[test]
    fn test_memoized_until_schema_tag_invalidated() {
        let (store, cache, ty) = setup();
        add_group(&store, &ty, "Main", &["color"]);
        let resolver = FieldResolver::new(store.clone(), cache.clone());
        assert_eq!(resolver.resolve_fields(ty.id).unwrap().property_fields.len(), 1);

        add_group(&store, &ty, "Extra", &["vendor"]);
        assert_eq!(resolver.resolve_fields(ty.id).unwrap().property_fields.len(), 1);

        cache.invalidate_tag(&common_tag(PROPERTY_ENTITY));
        assert_eq!(resolver.resolve_fields(ty.id).unwrap().property_fields.len(), 2);

        add_group(&store, &ty, "More", &["origin"]);
        resolver.invalidate(ty.id);
        assert_eq!(resolver.resolve_fields(ty.id).unwrap().property_fields.len(), 3);
    }
}
