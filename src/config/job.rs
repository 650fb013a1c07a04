//! Per-invocation import/export job settings.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::io::formats::CodecKind;
use crate::models::{AdditionalFieldSpec, ObjectTypeId, Representation};
use crate::{Error, Result};

/// Default separator for multi-valued property cells.
pub const DEFAULT_DELIMITER: &str = "|";

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

/// A property column of a job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PropertyFieldConfig {
    /// Property key (column title).
    pub key: String,
    /// Static value representation used in the file.
    #[serde(default, alias = "processValuesAs")]
    pub process_values_as: Option<Representation>,
}

/// A computed column of an export job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdditionalFieldConfig {
    /// Whether the column is filled.
    #[serde(default)]
    pub enabled: bool,
}

/// One import or export invocation.
///
/// ```toml
/// object_type = 1
/// codec = "excelCsv"
/// filename = "products.csv"
/// object = ["name", "price"]
/// multiple_values_delimiter = "|"
///
/// [[property]]
/// key = "color"
/// process_values_as = "text"
///
/// [additional_fields.url]
/// enabled = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Object type to import into or export from.
    #[serde(default, alias = "objectType")]
    pub object_type: Option<i64>,
    /// Codec name: `csv` or `excelCsv`.
    #[serde(default)]
    pub codec: Option<String>,
    /// File name, relative to the import or export directory.
    #[serde(default)]
    pub filename: Option<String>,
    /// Native attribute whitelist.
    #[serde(default)]
    pub object: Vec<String>,
    /// Property columns.
    #[serde(default)]
    pub property: Vec<PropertyFieldConfig>,
    /// Computed columns, keyed by column title.
    #[serde(default, alias = "additionalFields")]
    pub additional_fields: BTreeMap<String, AdditionalFieldConfig>,
    /// Separator for multi-valued cells (empty disables splitting).
    #[serde(default = "default_delimiter", alias = "multipleValuesDelimiter")]
    pub multiple_values_delimiter: String,
    /// Property groups attached to every imported record.
    #[serde(default, alias = "addPropertyGroups")]
    pub add_property_groups: Vec<i64>,
    /// Whether rows naming a missing `internal_id` create the record.
    #[serde(default, alias = "createIfNotExists")]
    pub create_if_not_exists: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            object_type: None,
            codec: None,
            filename: None,
            object: Vec::new(),
            property: Vec::new(),
            additional_fields: BTreeMap::new(),
            multiple_values_delimiter: default_delimiter(),
            add_property_groups: Vec::new(),
            create_if_not_exists: false,
        }
    }
}

impl JobConfig {
    /// Parses a job from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the text is not a valid job.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Configuration(format!("invalid job: {e}")))
    }

    /// Loads a job from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid job.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::operation("read_job_file", e))?;
        Self::from_toml_str(&contents)
    }

    /// Returns the object type, which every job must name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if it is missing or not positive.
    pub fn object_type_id(&self) -> Result<ObjectTypeId> {
        match self.object_type {
            Some(id) if id > 0 => Ok(ObjectTypeId::new(id)),
            Some(id) => Err(Error::Configuration(format!("invalid object_type {id}"))),
            None => Err(Error::Configuration("object_type is not set".to_string())),
        }
    }

    /// Returns the codec variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if it is missing or unknown.
    pub fn codec_kind(&self) -> Result<CodecKind> {
        self.codec
            .as_deref()
            .ok_or_else(|| Error::Configuration("codec is not set".to_string()))?
            .parse()
    }

    /// Returns the file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if it is missing or blank.
    pub fn filename(&self) -> Result<&str> {
        self.filename
            .as_deref()
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| Error::Configuration("filename is not set".to_string()))
    }

    /// Returns the multi-value delimiter, `None` when splitting is disabled.
    #[must_use]
    pub fn delimiter(&self) -> Option<&str> {
        Some(self.multiple_values_delimiter.as_str()).filter(|d| !d.is_empty())
    }

    /// Returns the computed columns in title order.
    #[must_use]
    pub fn additional_field_specs(&self) -> Vec<AdditionalFieldSpec> {
        self.additional_fields
            .iter()
            .map(|(key, field)| AdditionalFieldSpec {
                key: key.clone(),
                enabled: field.enabled,
            })
            .collect()
    }

    /// Checks every setting that can be checked without storage access.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::Configuration`] found.
    pub fn validate(&self) -> Result<()> {
        self.object_type_id()?;
        self.codec_kind()?;
        self.filename()?;

        let mut keys = std::collections::HashSet::new();
        for field in &self.property {
            if field.key.trim().is_empty() {
                return Err(Error::Configuration("property key is blank".to_string()));
            }
            if !keys.insert(field.key.as_str()) {
                return Err(Error::Configuration(format!(
                    "property '{}' is listed twice",
                    field.key
                )));
            }
        }
        if let Some(group) = self.add_property_groups.iter().find(|id| **id <= 0) {
            return Err(Error::Configuration(format!(
                "invalid property group id {group}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_JOB: &str = r#"
object_type = 3
codec = "excelCsv"
filename = "products.csv"
object = ["name", "price"]
add_property_groups = [1, 2]
create_if_not_exists = true

[[property]]
key = "color"
process_values_as = "text"

[[property]]
key = "size"

[additional_fields.url]
enabled = true

[additional_fields.thumbnail]
"#;

    #[test]
    fn test_parse_full_job() {
        let job = JobConfig::from_toml_str(FULL_JOB).unwrap();
        job.validate().unwrap();

        assert_eq!(job.object_type_id().unwrap(), ObjectTypeId::new(3));
        assert_eq!(job.codec_kind().unwrap(), CodecKind::ExcelCsv);
        assert_eq!(job.filename().unwrap(), "products.csv");
        assert_eq!(job.delimiter(), Some("|"));
        assert_eq!(job.property[0].process_values_as, Some(Representation::Text));
        assert_eq!(job.property[1].process_values_as, None);
        assert!(job.create_if_not_exists);

        let specs = job.additional_field_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].key, "thumbnail");
        assert!(!specs[0].enabled);
        assert!(specs[1].enabled);
    }

    #[test]
    fn test_camel_case_aliases() {
        let job = JobConfig::from_toml_str(
            r#"
objectType = 1
codec = "csv"
filename = "a.csv"
multipleValuesDelimiter = ","
createIfNotExists = true

[[property]]
key = "color"
processValuesAs = "id"
"#,
        )
        .unwrap();
        assert_eq!(job.object_type, Some(1));
        assert_eq!(job.delimiter(), Some(","));
        assert_eq!(job.property[0].process_values_as, Some(Representation::Id));
    }

    #[test]
    fn test_missing_object_type() {
        let job = JobConfig::from_toml_str("codec = \"csv\"\nfilename = \"a.csv\"").unwrap();
        assert!(matches!(job.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unknown_codec() {
        let job = JobConfig::from_toml_str(
            "object_type = 1\ncodec = \"xlsx\"\nfilename = \"a.csv\"",
        )
        .unwrap();
        assert!(matches!(job.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_unknown_representation_rejected() {
        let result = JobConfig::from_toml_str(
            "object_type = 1\n[[property]]\nkey = \"c\"\nprocess_values_as = \"slug\"",
        );
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_duplicate_property_rejected() {
        let job = JobConfig {
            object_type: Some(1),
            codec: Some("csv".to_string()),
            filename: Some("a.csv".to_string()),
            property: vec![
                PropertyFieldConfig {
                    key: "color".to_string(),
                    process_values_as: None,
                },
                PropertyFieldConfig {
                    key: "color".to_string(),
                    process_values_as: None,
                },
            ],
            ..JobConfig::default()
        };
        assert!(matches!(job.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_empty_delimiter_disables_splitting() {
        let job = JobConfig {
            multiple_values_delimiter: String::new(),
            ..JobConfig::default()
        };
        assert_eq!(job.delimiter(), None);
    }
}
