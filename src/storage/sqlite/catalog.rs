//! [`SchemaCatalog`] implementation for [`SqliteStore`].

use rusqlite::{OptionalExtension, Row, params};
use std::collections::BTreeMap;

use super::SqliteStore;
use crate::models::{
    AttributeDef, NewProperty, NewPropertyGroup, NewStaticValue, ObjectType, ObjectTypeId,
    Property, PropertyGroup, PropertyHandler, PropertyStaticValue, ValueType,
};
use crate::storage::traits::SchemaCatalog;
use crate::{Error, Result};

const PROPERTY_COLUMNS: &str = "p.id, p.property_group_id, p.name, p.property_key, p.value_type,
     p.property_handler_id, p.has_static_values, p.has_slugs_in_values, p.is_eav,
     p.handler_additional_params, p.sort_order";

const GROUP_COLUMNS: &str = "id, object_type_id, name, hidden, sort_order";

const STATIC_VALUE_COLUMNS: &str = "id, property_id, name, value, slug, sort_order, title_append";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<PropertyGroup> {
    Ok(PropertyGroup {
        id: row.get(0)?,
        object_type_id: ObjectTypeId::new(row.get(1)?),
        name: row.get(2)?,
        hidden: row.get(3)?,
        sort_order: row.get(4)?,
    })
}

fn property_from_row(row: &Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: row.get(0)?,
        property_group_id: row.get(1)?,
        name: row.get(2)?,
        key: row.get(3)?,
        value_type: ValueType::parse(&row.get::<_, String>(4)?),
        property_handler_id: row.get(5)?,
        has_static_values: row.get(6)?,
        has_slugs_in_values: row.get(7)?,
        is_eav: row.get(8)?,
        handler_additional_params: row.get(9)?,
        sort_order: row.get(10)?,
    })
}

/// Maps a static value row; shared with the property value queries.
pub(super) fn static_value_from_row(
    row: &Row<'_>,
    offset: usize,
) -> rusqlite::Result<PropertyStaticValue> {
    Ok(PropertyStaticValue {
        id: row.get(offset)?,
        property_id: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        value: row.get(offset + 3)?,
        slug: row.get(offset + 4)?,
        sort_order: row.get(offset + 5)?,
        title_append: row.get(offset + 6)?,
    })
}

fn validation(entity: &str, error: String, attributes: &[(&str, String)]) -> Error {
    Error::Validation {
        entity: entity.to_string(),
        errors: vec![error],
        attributes: attributes
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
    }
}

impl SchemaCatalog for SqliteStore {
    fn object_type(&self, id: ObjectTypeId) -> Result<Option<ObjectType>> {
        self.conn()
            .query_row(
                "SELECT id, name, record_class, attributes FROM object_types WHERE id = ?1",
                params![id.get()],
                |row| {
                    Ok(ObjectType {
                        id: ObjectTypeId::new(row.get(0)?),
                        name: row.get(1)?,
                        record_class: row.get(2)?,
                        attributes: Self::json_column(row, 3)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::operation("get_object_type", e))
    }

    fn create_object_type(
        &self,
        name: &str,
        record_class: Option<&str>,
        attributes: &[AttributeDef],
    ) -> Result<ObjectType> {
        if name.trim().is_empty() || attributes.iter().any(|a| a.name.trim().is_empty()) {
            return Err(validation(
                "object type",
                "names cannot be blank".to_string(),
                &[("name", name.to_string())],
            ));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = attributes.iter().find(|a| !seen.insert(a.name.as_str())) {
            return Err(validation(
                "object type",
                format!("attribute '{}' is declared twice", dup.name),
                &[("name", name.to_string())],
            ));
        }

        let json = serde_json::to_string(attributes)
            .map_err(|e| Error::operation("serialize_object_type_attributes", e))?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO object_types (name, record_class, attributes) VALUES (?1, ?2, ?3)",
            params![name, record_class, json],
        )
        .map_err(|e| Error::operation("create_object_type", e))?;

        Ok(ObjectType {
            id: ObjectTypeId::new(conn.last_insert_rowid()),
            name: name.to_string(),
            record_class: record_class.map(String::from),
            attributes: attributes.to_vec(),
        })
    }

    fn property_groups(&self, object_type_id: ObjectTypeId) -> Result<Vec<PropertyGroup>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GROUP_COLUMNS} FROM property_groups
                 WHERE object_type_id = ?1 ORDER BY sort_order, id"
            ))
            .map_err(|e| Error::operation("prepare_property_groups", e))?;

        stmt.query_map(params![object_type_id.get()], group_from_row)
            .map_err(|e| Error::operation("property_groups", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::operation("collect_property_groups", e))
    }

    fn find_property_group_by_prefix(
        &self,
        object_type_id: ObjectTypeId,
        prefix: &str,
    ) -> Result<Option<PropertyGroup>> {
        // substr comparison avoids LIKE wildcard escaping for arbitrary type names
        self.conn()
            .query_row(
                &format!(
                    "SELECT {GROUP_COLUMNS} FROM property_groups
                     WHERE object_type_id = ?1 AND substr(name, 1, length(?2)) = ?2
                     ORDER BY id LIMIT 1"
                ),
                params![object_type_id.get(), prefix],
                group_from_row,
            )
            .optional()
            .map_err(|e| Error::operation("find_property_group_by_prefix", e))
    }

    fn create_property_group(&self, group: &NewPropertyGroup) -> Result<PropertyGroup> {
        let attributes = [
            ("object_type_id", group.object_type_id.to_string()),
            ("name", group.name.clone()),
            ("hidden", group.hidden.to_string()),
        ];
        if group.name.trim().is_empty() {
            return Err(validation(
                "property group",
                "name cannot be blank".to_string(),
                &attributes,
            ));
        }

        let conn = self.conn();
        let sort_order: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM property_groups WHERE object_type_id = ?1",
                params![group.object_type_id.get()],
                |row| row.get(0),
            )
            .map_err(|e| Error::operation("next_group_sort_order", e))?;

        conn.execute(
            "INSERT INTO property_groups (object_type_id, name, hidden, sort_order)
             VALUES (?1, ?2, ?3, ?4)",
            params![group.object_type_id.get(), group.name, group.hidden, sort_order],
        )
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY constraint failed") {
                validation(
                    "property group",
                    format!("object type {} does not exist", group.object_type_id),
                    &attributes,
                )
            } else {
                Error::operation("create_property_group", e)
            }
        })?;

        Ok(PropertyGroup {
            id: conn.last_insert_rowid(),
            object_type_id: group.object_type_id,
            name: group.name.clone(),
            hidden: group.hidden,
            sort_order,
        })
    }

    fn properties_for_group(&self, group_id: i64) -> Result<Vec<Property>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PROPERTY_COLUMNS} FROM properties p
                 WHERE p.property_group_id = ?1 ORDER BY p.sort_order, p.id"
            ))
            .map_err(|e| Error::operation("prepare_properties_for_group", e))?;

        stmt.query_map(params![group_id], property_from_row)
            .map_err(|e| Error::operation("properties_for_group", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::operation("collect_properties_for_group", e))
    }

    fn property(&self, id: i64) -> Result<Option<Property>> {
        self.conn()
            .query_row(
                &format!("SELECT {PROPERTY_COLUMNS} FROM properties p WHERE p.id = ?1"),
                params![id],
                property_from_row,
            )
            .optional()
            .map_err(|e| Error::operation("get_property", e))
    }

    fn find_property_by_key(
        &self,
        object_type_id: ObjectTypeId,
        key: &str,
    ) -> Result<Option<Property>> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT {PROPERTY_COLUMNS} FROM properties p
                     JOIN property_groups g ON g.id = p.property_group_id
                     WHERE g.object_type_id = ?1 AND p.property_key = ?2
                     ORDER BY p.id LIMIT 1"
                ),
                params![object_type_id.get(), key],
                property_from_row,
            )
            .optional()
            .map_err(|e| Error::operation("find_property_by_key", e))
    }

    fn create_property(&self, property: &NewProperty) -> Result<Property> {
        let attributes = [
            ("property_group_id", property.property_group_id.to_string()),
            ("name", property.name.clone()),
            ("key", property.key.clone()),
            ("value_type", property.value_type.as_str().to_string()),
        ];
        if property.key.trim().is_empty() {
            return Err(validation(
                "property",
                "key cannot be blank".to_string(),
                &attributes,
            ));
        }

        let conn = self.conn();
        let object_type_id: Option<i64> = conn
            .query_row(
                "SELECT object_type_id FROM property_groups WHERE id = ?1",
                params![property.property_group_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::operation("get_property_group", e))?;
        let Some(object_type_id) = object_type_id else {
            return Err(validation(
                "property",
                format!("property group {} does not exist", property.property_group_id),
                &attributes,
            ));
        };

        let duplicate: Option<i64> = conn
            .query_row(
                "SELECT p.id FROM properties p
                 JOIN property_groups g ON g.id = p.property_group_id
                 WHERE g.object_type_id = ?1 AND p.property_key = ?2 LIMIT 1",
                params![object_type_id, property.key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::operation("check_property_key", e))?;
        if duplicate.is_some() {
            return Err(validation(
                "property",
                format!("key '{}' has already been taken", property.key),
                &attributes,
            ));
        }

        let sort_order: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(sort_order), 0) + 1 FROM properties WHERE property_group_id = ?1",
                params![property.property_group_id],
                |row| row.get(0),
            )
            .map_err(|e| Error::operation("next_property_sort_order", e))?;

        conn.execute(
            "INSERT INTO properties (property_group_id, name, property_key, value_type,
                 property_handler_id, has_static_values, has_slugs_in_values, is_eav,
                 handler_additional_params, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                property.property_group_id,
                property.name,
                property.key,
                property.value_type.as_str(),
                property.property_handler_id,
                property.has_static_values,
                property.has_slugs_in_values,
                property.is_eav,
                property.handler_additional_params,
                sort_order,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY constraint failed") {
                validation(
                    "property",
                    "property handler does not exist".to_string(),
                    &attributes,
                )
            } else {
                Error::operation("create_property", e)
            }
        })?;

        Ok(Property {
            id: conn.last_insert_rowid(),
            property_group_id: property.property_group_id,
            name: property.name.clone(),
            key: property.key.clone(),
            value_type: property.value_type,
            property_handler_id: property.property_handler_id,
            has_static_values: property.has_static_values,
            has_slugs_in_values: property.has_slugs_in_values,
            is_eav: property.is_eav,
            handler_additional_params: property.handler_additional_params.clone(),
            sort_order,
        })
    }

    fn find_handler_by_name(&self, name: &str) -> Result<Option<PropertyHandler>> {
        self.conn()
            .query_row(
                "SELECT id, name FROM property_handlers WHERE name = ?1",
                params![name],
                |row| {
                    Ok(PropertyHandler {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(|e| Error::operation("find_handler_by_name", e))
    }

    fn create_handler(&self, name: &str) -> Result<PropertyHandler> {
        {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO property_handlers (name) VALUES (?1) ON CONFLICT (name) DO NOTHING",
                params![name],
            )
            .map_err(|e| Error::operation("create_handler", e))?;
        }
        self.find_handler_by_name(name)?
            .ok_or_else(|| Error::NotFound {
                entity: "property handler",
                id: name.to_string(),
            })
    }

    fn static_values(&self, property_id: i64) -> Result<Vec<PropertyStaticValue>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {STATIC_VALUE_COLUMNS} FROM property_static_values
                 WHERE property_id = ?1 ORDER BY sort_order, id"
            ))
            .map_err(|e| Error::operation("prepare_static_values", e))?;

        stmt.query_map(params![property_id], |row| static_value_from_row(row, 0))
            .map_err(|e| Error::operation("static_values", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::operation("collect_static_values", e))
    }

    fn create_static_value(&self, value: &NewStaticValue) -> Result<PropertyStaticValue> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO property_static_values
                 (property_id, name, value, slug, sort_order, title_append)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                value.property_id,
                value.name,
                value.value,
                value.slug,
                value.sort_order,
                value.title_append,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("FOREIGN KEY constraint failed") {
                validation(
                    "static value",
                    format!("property {} does not exist", value.property_id),
                    &[
                        ("property_id", value.property_id.to_string()),
                        ("name", value.name.clone()),
                        ("value", value.value.clone()),
                    ],
                )
            } else {
                Error::operation("create_static_value", e)
            }
        })?;

        Ok(PropertyStaticValue {
            id: conn.last_insert_rowid(),
            property_id: value.property_id,
            name: value.name.clone(),
            value: value.value.clone(),
            slug: value.slug.clone(),
            sort_order: value.sort_order,
            title_append: value.title_append.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (SqliteStore, ObjectType) {
        let store = SqliteStore::in_memory().unwrap();
        let ty = store
            .create_object_type(
                "Product",
                Some("Product"),
                &[AttributeDef::new("id"), AttributeDef::new("name")],
            )
            .unwrap();
        (store, ty)
    }

    fn group(store: &SqliteStore, ty: &ObjectType, name: &str) -> PropertyGroup {
        store
            .create_property_group(&NewPropertyGroup {
                object_type_id: ty.id,
                name: name.to_string(),
                hidden: false,
            })
            .unwrap()
    }

    fn text_property(store: &SqliteStore, group_id: i64, key: &str) -> Property {
        let handler = store.create_handler("Text").unwrap();
        store
            .create_property(&NewProperty::text_column(group_id, handler.id, key))
            .unwrap()
    }

    #[test]
    fn test_object_type_round_trip() {
        let (store, ty) = setup();
        let loaded = store.object_type(ty.id).unwrap().unwrap();
        assert_eq!(loaded, ty);
        assert!(store.object_type(ObjectTypeId::new(99)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store.create_object_type(
            "Broken",
            None,
            &[AttributeDef::new("name"), AttributeDef::new("name")],
        );
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_groups_in_creation_order() {
        let (store, ty) = setup();
        let a = group(&store, &ty, "Main");
        let b = group(&store, &ty, "Extra");
        let groups = store.property_groups(ty.id).unwrap();
        assert_eq!(groups.iter().map(|g| g.id).collect::<Vec<_>>(), vec![a.id, b.id]);
        assert!(b.sort_order > a.sort_order);
    }

    #[test]
    fn test_find_group_by_prefix() {
        let (store, ty) = setup();
        group(&store, &ty, "New properties for Product created at 2026-10-18 10:00:00");
        let found = store
            .find_property_group_by_prefix(ty.id, "New properties for Product created at 2026-10-18")
            .unwrap();
        assert!(found.is_some());
        let missing = store
            .find_property_group_by_prefix(ty.id, "New properties for Product created at 2026-10-19")
            .unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_group_for_unknown_type_is_validation_error() {
        let (store, _) = setup();
        let result = store.create_property_group(&NewPropertyGroup {
            object_type_id: ObjectTypeId::new(404),
            name: "Orphan".to_string(),
            hidden: false,
        });
        assert!(matches!(result, Err(Error::Validation { .. })));
    }

    #[test]
    fn test_property_key_unique_per_object_type() {
        let (store, ty) = setup();
        let main = group(&store, &ty, "Main");
        let extra = group(&store, &ty, "Extra");
        let color = text_property(&store, main.id, "color");

        let handler = store.find_handler_by_name("Text").unwrap().unwrap();
        let dup = store.create_property(&NewProperty::text_column(extra.id, handler.id, "color"));
        assert!(matches!(dup, Err(Error::Validation { .. })));

        let found = store.find_property_by_key(ty.id, "color").unwrap().unwrap();
        assert_eq!(found.id, color.id);
        assert!(found.is_eav);
        assert_eq!(store.property(color.id).unwrap(), Some(color));
    }

    #[test]
    fn test_create_handler_is_idempotent() {
        let (store, _) = setup();
        let first = store.create_handler("Text").unwrap();
        let second = store.create_handler("Text").unwrap();
        assert_eq!(first, second);
        assert!(store.find_handler_by_name("Select").unwrap().is_none());
    }

    #[test]
    fn test_static_values() {
        let (store, ty) = setup();
        let main = group(&store, &ty, "Main");
        let color = text_property(&store, main.id, "color");

        let red = store
            .create_static_value(&NewStaticValue::from_text(color.id, "Red"))
            .unwrap();
        store
            .create_static_value(&NewStaticValue::from_text(color.id, "Blue"))
            .unwrap();

        let values = store.static_values(color.id).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[0], red);

        let orphan = store.create_static_value(&NewStaticValue::from_text(999, "x"));
        assert!(matches!(orphan, Err(Error::Validation { .. })));
    }
}
