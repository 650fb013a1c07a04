//! Schema entities of the dynamic attribute model.
//!
//! An [`ObjectType`] declares the native attributes of its records. Dynamic
//! attributes are [`Property`] rows grouped into [`PropertyGroup`]s; a group
//! is attached to individual records through an [`ObjectPropertyGroup`] link.
//!
//! # Example
//!
//! ```rust,ignore
//! use eavio::models::{NewStaticValue, Representation};
//!
//! let psv = NewStaticValue::from_text(property.id, "Dark Red");
//! assert_eq!(psv.slug, "Dark Red");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Representation;

/// Unique identifier for an object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectTypeId(i64);

impl ObjectTypeId {
    /// Creates a new object type ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ObjectTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ObjectTypeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Declaration of one native attribute of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    /// Attribute (column) name.
    pub name: String,
    /// Value assigned to freshly created records.
    #[serde(default)]
    pub default: Option<String>,
    /// Whether the attribute must be non-empty for the record to be saved.
    #[serde(default)]
    pub required: bool,
}

impl AttributeDef {
    /// Creates an optional attribute without a default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            required: false,
        }
    }

    /// Marks the attribute as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// A domain entity kind (e.g. products, pages).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectType {
    /// Identifier.
    pub id: ObjectTypeId,
    /// Human readable name, used when naming auto-created property groups.
    pub name: String,
    /// Backing record class. Types without one cannot be imported or exported.
    pub record_class: Option<String>,
    /// Native attributes, including the identifier attribute.
    pub attributes: Vec<AttributeDef>,
}

impl ObjectType {
    /// Name of the identifier attribute every record class carries.
    pub const ID_ATTRIBUTE: &'static str = "id";

    /// Returns the declared attribute names in declaration order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Returns the attribute declaration with the given name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns the short form name of the record class.
    ///
    /// `catalog.Product` and `catalog::Product` both yield `Product`.
    #[must_use]
    pub fn form_name(&self) -> &str {
        let class = self.record_class.as_deref().unwrap_or(&self.name);
        class
            .rsplit(['\\', ':', '.'])
            .find(|part| !part.is_empty())
            .unwrap_or(class)
    }
}

/// Storage type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValueType {
    /// Free text.
    #[default]
    String,
    /// Numeric value.
    Number,
}

impl ValueType {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Number => "NUMBER",
        }
    }

    /// Parses a value type, defaulting to [`ValueType::String`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "NUMBER" | "NUMERIC" => Self::Number,
            _ => Self::String,
        }
    }
}

/// A named handler that renders and edits a property (e.g. `Text`, `Select`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyHandler {
    /// Identifier.
    pub id: i64,
    /// Handler name.
    pub name: String,
}

/// A named bundle of properties scoped to one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyGroup {
    /// Identifier.
    pub id: i64,
    /// Owning object type.
    pub object_type_id: ObjectTypeId,
    /// Group name.
    pub name: String,
    /// Whether the group title is hidden (auto-created groups).
    pub hidden: bool,
    /// Position among the object type's groups.
    pub sort_order: i64,
}

/// Attributes for creating a property group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPropertyGroup {
    /// Owning object type.
    pub object_type_id: ObjectTypeId,
    /// Group name.
    pub name: String,
    /// Whether the group title is hidden.
    pub hidden: bool,
}

/// A dynamic attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Identifier.
    pub id: i64,
    /// Owning group.
    pub property_group_id: i64,
    /// Display name.
    pub name: String,
    /// Import/export column name.
    pub key: String,
    /// Value storage type.
    pub value_type: ValueType,
    /// Optional handler.
    pub property_handler_id: Option<i64>,
    /// Whether values are restricted to static values.
    pub has_static_values: bool,
    /// Whether static values carry slugs.
    pub has_slugs_in_values: bool,
    /// Whether values are stored as EAV rows.
    pub is_eav: bool,
    /// Opaque handler configuration (JSON).
    pub handler_additional_params: String,
    /// Position inside the group.
    pub sort_order: i64,
}

/// Attributes for creating a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProperty {
    /// Owning group.
    pub property_group_id: i64,
    /// Display name.
    pub name: String,
    /// Import/export column name.
    pub key: String,
    /// Value storage type.
    pub value_type: ValueType,
    /// Optional handler.
    pub property_handler_id: Option<i64>,
    /// Whether values are restricted to static values.
    pub has_static_values: bool,
    /// Whether static values carry slugs.
    pub has_slugs_in_values: bool,
    /// Whether values are stored as EAV rows.
    pub is_eav: bool,
    /// Opaque handler configuration (JSON).
    pub handler_additional_params: String,
}

impl NewProperty {
    /// A plain text property created for an unmapped import column.
    #[must_use]
    pub fn text_column(property_group_id: i64, handler_id: i64, key: &str) -> Self {
        Self {
            property_group_id,
            name: key.to_string(),
            key: key.to_string(),
            value_type: ValueType::String,
            property_handler_id: Some(handler_id),
            has_static_values: false,
            has_slugs_in_values: false,
            is_eav: true,
            handler_additional_params: "{}".to_string(),
        }
    }
}

/// One allowed value of a closed-set property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyStaticValue {
    /// Identifier.
    pub id: i64,
    /// Owning property.
    pub property_id: i64,
    /// Display text.
    pub name: String,
    /// Raw value.
    pub value: String,
    /// URL slug.
    pub slug: String,
    /// Position among the property's values.
    pub sort_order: i64,
    /// Text appended to titles of objects carrying this value.
    pub title_append: String,
}

impl PropertyStaticValue {
    /// Returns the attribute selected by a representation.
    #[must_use]
    pub fn represent(&self, representation: Representation) -> String {
        match representation {
            Representation::Text => self.name.clone(),
            Representation::Value => self.value.clone(),
            Representation::Id => self.id.to_string(),
        }
    }

    /// Returns whether `text` names this value in the given representation.
    ///
    /// Both sides are trimmed and compared case-insensitively.
    #[must_use]
    pub fn matches(&self, representation: Representation, text: &str) -> bool {
        self.represent(representation).trim().to_lowercase() == text.trim().to_lowercase()
    }
}

/// Attributes for creating a static value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStaticValue {
    /// Owning property.
    pub property_id: i64,
    /// Display text.
    pub name: String,
    /// Raw value.
    pub value: String,
    /// URL slug.
    pub slug: String,
    /// Position among the property's values.
    pub sort_order: i64,
    /// Text appended to titles.
    pub title_append: String,
}

impl NewStaticValue {
    /// A static value whose name, value and slug are the imported text verbatim.
    #[must_use]
    pub fn from_text(property_id: i64, text: &str) -> Self {
        Self {
            property_id,
            name: text.to_string(),
            value: text.to_string(),
            slug: text.to_string(),
            sort_order: 0,
            title_append: String::new(),
        }
    }
}

/// Link between an object record and a property group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectPropertyGroup {
    /// Object type of the record.
    pub object_type_id: ObjectTypeId,
    /// Record identifier.
    pub object_model_id: i64,
    /// Attached group.
    pub property_group_id: i64,
}
