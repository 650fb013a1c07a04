//! Import/export services.

pub mod export;
pub mod import;

use crate::config::{DEFAULT_DELIMITER, JobConfig};
use crate::io::formats::CodecKind;
use crate::io::mapper::Delimiter;
use crate::models::{AdditionalFieldSpec, ObjectType, PropertyFieldSpec};
use crate::storage::SchemaCatalog;
use crate::{Error, Result};

/// A job with every reference checked against the schema.
///
/// Building one performs all configuration checks, so services fail with
/// [`Error::Configuration`] before touching any file.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Target object type.
    pub object_type: ObjectType,
    /// File codec.
    pub codec: CodecKind,
    /// File name relative to the import or export directory.
    pub filename: String,
    /// Native attribute whitelist.
    pub object_fields: Vec<String>,
    /// Property columns.
    pub property_fields: Vec<PropertyFieldSpec>,
    /// Computed export columns.
    pub additional_fields: Vec<AdditionalFieldSpec>,
    /// Multi-value delimiter.
    pub delimiter: Option<Delimiter>,
    /// Groups attached to every imported record.
    pub add_property_groups: Vec<i64>,
    /// Whether unknown `internal_id`s create records.
    pub create_if_not_exists: bool,
}

impl JobRequest {
    /// Resolves a job against the schema catalog.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for invalid settings, unknown
    /// attributes or unknown property keys, and [`Error::NotFound`] if the
    /// object type does not exist.
    pub fn from_job<C: SchemaCatalog + ?Sized>(job: &JobConfig, catalog: &C) -> Result<Self> {
        job.validate()?;
        let object_type_id = job.object_type_id()?;
        let object_type = catalog
            .object_type(object_type_id)?
            .ok_or_else(|| Error::NotFound {
                entity: "object type",
                id: object_type_id.to_string(),
            })?;

        for field in &job.object {
            if field == ObjectType::ID_ATTRIBUTE || object_type.attribute(field).is_none() {
                return Err(Error::Configuration(format!(
                    "'{field}' is not an attribute of {}",
                    object_type.name
                )));
            }
        }

        let mut property_fields = Vec::with_capacity(job.property.len());
        for field in &job.property {
            let property = catalog
                .find_property_by_key(object_type.id, &field.key)?
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "unknown property key '{}' for {}",
                        field.key, object_type.name
                    ))
                })?;
            property_fields.push(PropertyFieldSpec {
                property_id: property.id,
                key: field.key.clone(),
                process_values_as: field.process_values_as,
            });
        }

        let delimiter = job.delimiter().map(Delimiter::parse).transpose()?;

        Ok(Self {
            codec: job.codec_kind()?,
            filename: job.filename()?.to_string(),
            object_fields: job.object.clone(),
            property_fields,
            additional_fields: job.additional_field_specs(),
            delimiter,
            add_property_groups: job.add_property_groups.clone(),
            create_if_not_exists: job.create_if_not_exists,
            object_type,
        })
    }

    /// Returns the text used to join multi-valued cells on export.
    #[must_use]
    pub fn join_delimiter(&self) -> &str {
        self.delimiter
            .as_ref()
            .map_or(DEFAULT_DELIMITER, Delimiter::as_str)
    }

    /// Returns whether records of the type can be imported or exported.
    #[must_use]
    pub const fn is_transferable(&self) -> bool {
        self.object_type.record_class.is_some()
    }
}
