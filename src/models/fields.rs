//! Field specifications for import and export.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::Error;

/// How static values are written to and read from files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    /// The static value's display name.
    Text,
    /// The static value's raw value.
    Value,
    /// The static value's identifier.
    Id,
}

impl Representation {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Value => "value",
            Self::Id => "id",
        }
    }
}

impl FromStr for Representation {
    type Err = Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "value" => Ok(Self::Value),
            "id" => Ok(Self::Id),
            _ => Err(Error::Configuration(format!(
                "unknown processValuesAs representation: {s}"
            ))),
        }
    }
}

/// A property column selected for import or export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyFieldSpec {
    /// The property the column maps to.
    pub property_id: i64,
    /// Column title (the property key).
    pub key: String,
    /// Static value representation, when the column carries static values.
    pub process_values_as: Option<Representation>,
}

/// A computed column supplied by an [`crate::hooks::AdditionalFieldsProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalFieldSpec {
    /// Column title.
    pub key: String,
    /// Whether the column is filled.
    #[serde(default)]
    pub enabled: bool,
}

/// The fields of an object type eligible for import and export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFields {
    /// Native attributes minus the identifier, in declaration order.
    pub object_fields: Vec<String>,
    /// Property keys, group order then in-group order.
    pub property_fields: Vec<String>,
    /// Computed fields (none are discovered automatically).
    #[serde(default)]
    pub additional_fields: Vec<String>,
}

impl ResolvedFields {
    /// Returns whether the object type has nothing to import or export.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.object_fields.is_empty() && self.property_fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_representation_from_str() {
        assert_eq!("text".parse::<Representation>().ok(), Some(Representation::Text));
        assert_eq!("VALUE".parse::<Representation>().ok(), Some(Representation::Value));
        assert_eq!("id".parse::<Representation>().ok(), Some(Representation::Id));
        assert!("slug".parse::<Representation>().is_err());
    }

    #[test]
    fn test_representation_serde() {
        let parsed: Representation = serde_json::from_str("\"text\"").unwrap_or(Representation::Id);
        assert_eq!(parsed, Representation::Text);
    }
}
