//! [`PropertyValueStore`] implementation for [`SqliteStore`].

use std::collections::BTreeMap;
use std::time::Instant;

use rusqlite::{OptionalExtension, params};

use super::SqliteStore;
use super::catalog::static_value_from_row;
use super::metrics::record_operation_metrics;
use crate::models::{
    FieldValue, ObjectPropertyGroup, ObjectType, ObjectTypeId, PropertyValueSet,
    StoredPropertyValue,
};
use crate::storage::traits::PropertyValueStore;
use crate::{Error, Result};

impl SqliteStore {
    fn save_properties_inner(
        &self,
        object_type: &ObjectType,
        record_id: i64,
        form_id: &str,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<usize> {
        let type_id = object_type.id.get();
        let conn = self.conn();
        let mut written = 0;

        for (key, value) in values {
            let property_id: Option<i64> = conn
                .query_row(
                    "SELECT p.id FROM properties p
                     JOIN object_property_groups opg
                       ON opg.property_group_id = p.property_group_id
                     WHERE opg.object_type_id = ?1 AND opg.object_model_id = ?2
                       AND p.property_key = ?3
                     ORDER BY p.id LIMIT 1",
                    params![type_id, record_id, key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::operation("resolve_property_key", e))?;

            let Some(property_id) = property_id else {
                tracing::debug!(form = form_id, key = %key, "Skipping property outside attached groups");
                continue;
            };

            conn.execute(
                "DELETE FROM property_values
                 WHERE object_type_id = ?1 AND object_model_id = ?2 AND property_id = ?3",
                params![type_id, record_id, property_id],
            )
            .map_err(|e| Error::operation("clear_property_values", e))?;

            let elements = value.elements();
            for (position, element) in elements.iter().filter(|e| !e.is_empty()).enumerate() {
                conn.execute(
                    "INSERT INTO property_values
                         (object_type_id, object_model_id, property_id, position, value)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        type_id,
                        record_id,
                        property_id,
                        i64::try_from(position).unwrap_or(i64::MAX),
                        element
                    ],
                )
                .map_err(|e| Error::operation("insert_property_value", e))?;
            }
            written += 1;
        }

        tracing::debug!(form = form_id, written, "Saved property values");
        Ok(written)
    }
}

impl PropertyValueStore for SqliteStore {
    fn attach_group(&self, link: ObjectPropertyGroup) -> Result<bool> {
        let conn = self.conn();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM property_groups WHERE id = ?1 AND object_type_id = ?2",
                params![link.property_group_id, link.object_type_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::operation("check_property_group", e))?;
        if exists.is_none() {
            return Err(Error::Validation {
                entity: "object property group".to_string(),
                errors: vec![format!(
                    "property group {} does not exist for object type {}",
                    link.property_group_id, link.object_type_id
                )],
                attributes: BTreeMap::from([
                    ("object_type_id".to_string(), link.object_type_id.to_string()),
                    ("object_model_id".to_string(), link.object_model_id.to_string()),
                    ("property_group_id".to_string(), link.property_group_id.to_string()),
                ]),
            });
        }

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO object_property_groups
                     (object_type_id, object_model_id, property_group_id)
                 VALUES (?1, ?2, ?3)",
                params![
                    link.object_type_id.get(),
                    link.object_model_id,
                    link.property_group_id
                ],
            )
            .map_err(|e| Error::operation("attach_group", e))?;
        Ok(inserted > 0)
    }

    fn record_groups(&self, object_type_id: ObjectTypeId, record_id: i64) -> Result<Vec<i64>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT property_group_id FROM object_property_groups
                 WHERE object_type_id = ?1 AND object_model_id = ?2
                 ORDER BY property_group_id",
            )
            .map_err(|e| Error::operation("prepare_record_groups", e))?;

        stmt.query_map(params![object_type_id.get(), record_id], |row| row.get(0))
            .map_err(|e| Error::operation("record_groups", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::operation("collect_record_groups", e))
    }

    fn save_properties(
        &self,
        object_type: &ObjectType,
        record_id: i64,
        form_id: &str,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<usize> {
        let start = Instant::now();
        let result = self.save_properties_inner(object_type, record_id, form_id, values);
        record_operation_metrics("save_properties", start, result.is_ok());
        result
    }

    fn property_values(
        &self,
        object_type_id: ObjectTypeId,
        record_id: i64,
        property_id: i64,
    ) -> Result<Option<PropertyValueSet>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT pv.value, psv.id, psv.property_id, psv.name, psv.value, psv.slug,
                        psv.sort_order, psv.title_append
                 FROM property_values pv
                 JOIN properties p ON p.id = pv.property_id
                 LEFT JOIN property_static_values psv
                   ON p.has_static_values = 1
                  AND psv.property_id = p.id
                  AND CAST(psv.id AS TEXT) = pv.value
                 WHERE pv.object_type_id = ?1 AND pv.object_model_id = ?2 AND pv.property_id = ?3
                 ORDER BY pv.position",
            )
            .map_err(|e| Error::operation("prepare_property_values", e))?;

        let values = stmt
            .query_map(params![object_type_id.get(), record_id, property_id], |row| {
                let static_id: Option<i64> = row.get(1)?;
                let static_value = match static_id {
                    Some(_) => Some(static_value_from_row(row, 1)?),
                    None => None,
                };
                Ok(StoredPropertyValue {
                    value: row.get(0)?,
                    static_value,
                })
            })
            .map_err(|e| Error::operation("property_values", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::operation("collect_property_values", e))?;

        if values.is_empty() {
            return Ok(None);
        }
        Ok(Some(PropertyValueSet {
            property_id,
            values,
        }))
    }
}
