//! Object records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ObjectType, ObjectTypeId};

/// An instance of an object type.
///
/// Native attributes are kept as text keyed by attribute name; dynamic
/// properties are stored separately through property groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Identifier (0 until first saved, unless pre-seeded).
    pub id: i64,
    /// Object type of the record.
    pub object_type_id: ObjectTypeId,
    /// Native attribute values (identifier excluded).
    pub attributes: BTreeMap<String, String>,
    /// Whether the record has not been persisted yet.
    #[serde(skip)]
    is_new: bool,
}

impl ObjectRecord {
    /// Creates an unsaved record populated with the type's default values.
    #[must_use]
    pub fn with_defaults(object_type: &ObjectType) -> Self {
        let attributes = object_type
            .attributes
            .iter()
            .filter(|a| a.name != ObjectType::ID_ATTRIBUTE)
            .filter_map(|a| a.default.clone().map(|d| (a.name.clone(), d)))
            .collect();

        Self {
            id: 0,
            object_type_id: object_type.id,
            attributes,
            is_new: true,
        }
    }

    /// Creates an unsaved record pre-seeded with an identifier.
    #[must_use]
    pub fn with_id(object_type: &ObjectType, id: i64) -> Self {
        Self {
            id,
            object_type_id: object_type.id,
            attributes: BTreeMap::new(),
            is_new: true,
        }
    }

    /// Rehydrates a persisted record.
    #[must_use]
    pub const fn persisted(
        id: i64,
        object_type_id: ObjectTypeId,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            object_type_id,
            attributes,
            is_new: false,
        }
    }

    /// Returns whether the record has not been persisted yet.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Marks the record as persisted under the given identifier.
    pub const fn mark_persisted(&mut self, id: i64) {
        self.id = id;
        self.is_new = false;
    }

    /// Returns a native attribute value.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.attributes.get(attribute).map(String::as_str)
    }

    /// Sets a native attribute value.
    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(attribute.into(), value.into());
    }

    /// Returns the key under which property values of this record are submitted.
    #[must_use]
    pub fn form_identifier(&self, object_type: &ObjectType) -> String {
        format!("Properties_{}_{}", object_type.form_name(), self.id)
    }
}
