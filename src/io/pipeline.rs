//! Per-row object save pipeline.
//!
//! Runs inside the file-level transaction opened by the import service; any
//! error returned here rolls back every row of the file.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::cache::{
    CacheStore, OBJECT_TYPE_ENTITY, PROPERTY_ENTITY, PROPERTY_GROUP_ENTITY, common_tag, get_typed,
    object_tag, set_typed,
};
use crate::hooks::{HookRegistry, ImportRowContext, record_tag};
use crate::io::mapper::{Delimiter, MappedRow};
use crate::io::services::JobRequest;
use crate::models::{
    FieldValue, NewProperty, NewPropertyGroup, NewStaticValue, ObjectPropertyGroup, ObjectRecord,
    PropertyGroup, PropertyStaticValue, Representation,
};
use crate::storage::{PropertyValueStore, RecordStore, SchemaCatalog, Store};
use crate::Result;

/// Handler looked up for auto-created properties.
pub const TEXT_HANDLER: &str = "Text";

/// Lifetime of cached static value lists.
const STATIC_VALUES_TTL: Duration = Duration::from_secs(3600);

/// What happened to one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new record was created with this id.
    Created(i64),
    /// An existing record was updated.
    Updated(i64),
    /// The row named a missing record and creation was disabled.
    Skipped,
}

impl SaveOutcome {
    /// Returns the metric label of the outcome.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::Skipped => "skipped",
        }
    }
}

/// Saves mapped rows of one file.
pub struct ObjectSavePipeline<'a> {
    store: &'a dyn Store,
    cache: &'a dyn CacheStore,
    hooks: &'a HookRegistry,
    request: &'a JobRequest,
    started_at: DateTime<Utc>,
}

impl<'a> ObjectSavePipeline<'a> {
    /// Creates a pipeline for one import run.
    ///
    /// `started_at` names the hidden property group created for unmapped
    /// columns.
    #[must_use]
    pub fn new(
        store: &'a dyn Store,
        cache: &'a dyn CacheStore,
        hooks: &'a HookRegistry,
        request: &'a JobRequest,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            cache,
            hooks,
            request,
            started_at,
        }
    }

    /// Saves one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the record, a group link, a static value, a
    /// property or the property values cannot be saved, or if a hook fails.
    pub fn save(&self, row: &MappedRow) -> Result<SaveOutcome> {
        let object_type = &self.request.object_type;
        let Some(mut record) = self.target_record(row)? else {
            tracing::info!(
                object_type = %object_type.id,
                record_id = row.object_id,
                row = row.line,
                "Record not found and creation disabled, skipping row"
            );
            return Ok(SaveOutcome::Skipped);
        };
        let created = record.is_new();

        for field in &self.request.object_fields {
            if let Some(value) = row.object_attributes.get(field) {
                record.set(field.clone(), value.clone());
            }
        }

        let additional = &self.request.additional_fields;
        let context = ImportRowContext {
            row: &row.row,
            delimiter: self.request.delimiter.as_ref().map(Delimiter::as_str),
            additional_fields: additional,
        };
        let capabilities = self.hooks.capabilities(object_type.id);
        if let Some(hook) = &capabilities.pre_save {
            hook.before_save(&mut record, &context)?;
        }

        self.store.save_record(object_type, &mut record)?;
        tracing::debug!(
            object_type = %object_type.id,
            record_id = record.id,
            row = row.line,
            created,
            "Saved record"
        );

        self.attach_configured_groups(&record)?;

        let values = self.resolve_property_values(row)?;
        let form_id = record.form_identifier(object_type);
        if !values.is_empty() {
            self.store
                .save_properties(object_type, record.id, &form_id, &values)?;
        }

        if !row.unchecked.is_empty() {
            self.save_unmapped(&record, &form_id, &row.unchecked)?;
        }

        if let Some(hook) = &capabilities.post_save {
            hook.after_save(&record, &context)?;
        }
        if let Some(invalidator) = &capabilities.cache_invalidator {
            invalidator.invalidate(&record, self.cache);
        }

        Ok(if created {
            SaveOutcome::Created(record.id)
        } else {
            SaveOutcome::Updated(record.id)
        })
    }

    /// Finds the record a row targets, or a new one to create.
    fn target_record(&self, row: &MappedRow) -> Result<Option<ObjectRecord>> {
        let object_type = &self.request.object_type;
        if row.object_id <= 0 {
            return Ok(Some(ObjectRecord::with_defaults(object_type)));
        }
        if let Some(existing) = self.store.find_record(object_type, row.object_id)? {
            return Ok(Some(existing));
        }
        if self.request.create_if_not_exists {
            return Ok(Some(ObjectRecord::with_id(object_type, row.object_id)));
        }
        Ok(None)
    }

    fn attach_configured_groups(&self, record: &ObjectRecord) -> Result<()> {
        if self.request.add_property_groups.is_empty() {
            return Ok(());
        }
        for group_id in &self.request.add_property_groups {
            self.store.attach_group(ObjectPropertyGroup {
                object_type_id: record.object_type_id,
                object_model_id: record.id,
                property_group_id: *group_id,
            })?;
        }
        self.cache
            .invalidate_tag(&record_tag(record.object_type_id, record.id));
        Ok(())
    }

    fn resolve_property_values(&self, row: &MappedRow) -> Result<BTreeMap<String, FieldValue>> {
        let mut values = BTreeMap::new();
        for spec in &self.request.property_fields {
            let Some(value) = row.property_values.get(&spec.key) else {
                continue;
            };
            let resolved = match spec.process_values_as {
                Some(representation) => FieldValue::List(
                    self.static_value_ids(spec.property_id, representation, &value.elements())?
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                ),
                None => value.clone(),
            };
            values.insert(spec.key.clone(), resolved);
        }
        Ok(values)
    }

    /// Converts textual elements into static value ids, creating values
    /// that do not exist yet.
    ///
    /// Matching is trimmed and case-insensitive; every matching static value
    /// contributes its id.
    fn static_value_ids(
        &self,
        property_id: i64,
        representation: Representation,
        elements: &[&str],
    ) -> Result<Vec<i64>> {
        let mut static_values = self.static_values(property_id)?;
        let mut ids = Vec::new();

        for original in elements {
            if original.trim().is_empty() {
                continue;
            }
            let matches: Vec<i64> = static_values
                .iter()
                .filter(|psv| psv.matches(representation, original))
                .map(|psv| psv.id)
                .collect();
            if !matches.is_empty() {
                ids.extend(matches);
                continue;
            }

            let created = self
                .store
                .create_static_value(&NewStaticValue::from_text(property_id, original))?;
            metrics::counter!("eavio_static_values_created_total").increment(1);
            tracing::debug!(property_id, static_value_id = created.id, "Created static value");
            ids.push(created.id);

            self.cache
                .invalidate_tag(&object_tag(PROPERTY_ENTITY, property_id));
            static_values = self.static_values(property_id)?;
        }

        Ok(ids)
    }

    fn static_values(&self, property_id: i64) -> Result<Vec<PropertyStaticValue>> {
        let key = format!("static_values:{property_id}");
        if let Some(values) = get_typed(self.cache, &key) {
            return Ok(values);
        }
        let values = self.store.static_values(property_id)?;
        set_typed(
            self.cache,
            &key,
            &values,
            Some(STATIC_VALUES_TTL),
            &[object_tag(PROPERTY_ENTITY, property_id)],
        );
        Ok(values)
    }

    /// Stores unmapped columns as text properties of a hidden group.
    fn save_unmapped(
        &self,
        record: &ObjectRecord,
        form_id: &str,
        unchecked: &BTreeMap<String, String>,
    ) -> Result<()> {
        let object_type = &self.request.object_type;
        let group = self.hidden_group()?;

        let Some(handler) = self.store.find_handler_by_name(TEXT_HANDLER)? else {
            tracing::warn!(
                object_type = %object_type.id,
                handler = TEXT_HANDLER,
                "No handler for auto-created properties, dropping unmapped columns"
            );
            return Ok(());
        };

        for key in unchecked.keys() {
            if self
                .store
                .find_property_by_key(object_type.id, key)?
                .is_some()
            {
                continue;
            }
            let property = self
                .store
                .create_property(&NewProperty::text_column(group.id, handler.id, key))?;
            metrics::counter!("eavio_properties_autocreated_total").increment(1);
            tracing::info!(
                object_type = %object_type.id,
                property_id = property.id,
                key = %key,
                "Created property for unmapped column"
            );
            self.cache.invalidate_tag(&common_tag(PROPERTY_ENTITY));
        }

        self.store.attach_group(ObjectPropertyGroup {
            object_type_id: object_type.id,
            object_model_id: record.id,
            property_group_id: group.id,
        })?;

        let values: BTreeMap<String, FieldValue> = unchecked
            .iter()
            .map(|(key, value)| (key.clone(), FieldValue::Scalar(value.clone())))
            .collect();
        self.store
            .save_properties(object_type, record.id, form_id, &values)?;
        Ok(())
    }

    /// Finds today's hidden group of the object type, creating it if needed.
    fn hidden_group(&self) -> Result<PropertyGroup> {
        let object_type = &self.request.object_type;
        let prefix = format!("New properties for {} created at", object_type.name);
        let today = format!("{prefix} {}", self.started_at.format("%Y-%m-%d"));

        if let Some(group) = self
            .store
            .find_property_group_by_prefix(object_type.id, &today)?
        {
            return Ok(group);
        }

        let group = self.store.create_property_group(&NewPropertyGroup {
            object_type_id: object_type.id,
            name: format!("{prefix} {}", self.started_at.format("%Y-%m-%d %H:%M:%S")),
            hidden: true,
        })?;
        tracing::info!(
            object_type = %object_type.id,
            group_id = group.id,
            name = %group.name,
            "Created hidden property group"
        );
        self.cache.invalidate_tags(&[
            common_tag(PROPERTY_GROUP_ENTITY),
            object_tag(OBJECT_TYPE_ENTITY, object_type.id),
        ]);
        Ok(group)
    }
}
