//! Property values.

use serde::{Deserialize, Serialize};

use super::{PropertyStaticValue, Representation};

/// A cell value that is either a single string or a list of elements.
///
/// Property columns split with a multi-value delimiter become lists; all
/// other values stay scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A single value.
    Scalar(String),
    /// An ordered list of values.
    List(Vec<String>),
}

impl FieldValue {
    /// Returns the elements of the value (a scalar is a one-element list).
    #[must_use]
    pub fn elements(&self) -> Vec<&str> {
        match self {
            Self::Scalar(s) => vec![s.as_str()],
            Self::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Returns whether the value carries nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::List(items) => items.is_empty(),
        }
    }

    /// Joins the elements with a delimiter.
    #[must_use]
    pub fn join(&self, delimiter: &str) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            Self::List(items) => items.join(delimiter),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

/// One stored value of a property on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPropertyValue {
    /// The stored text (a static value id for closed-set properties).
    pub value: String,
    /// The static value the stored id points at, if any.
    pub static_value: Option<PropertyStaticValue>,
}

impl StoredPropertyValue {
    /// Renders the value for export.
    ///
    /// Static values honour the representation; plain values ignore it.
    #[must_use]
    pub fn represent(&self, representation: Representation) -> String {
        self.static_value
            .as_ref()
            .map_or_else(|| self.value.clone(), |psv| psv.represent(representation))
    }

    /// Renders the value without an explicit representation.
    #[must_use]
    pub fn display(&self) -> String {
        self.represent(Representation::Value)
    }
}

/// All values of one property on one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValueSet {
    /// The property.
    pub property_id: i64,
    /// Values in their stored order.
    pub values: Vec<StoredPropertyValue>,
}

impl PropertyValueSet {
    /// Returns whether more than one value is stored.
    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        self.values.len() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_elements() {
        assert_eq!(FieldValue::from("a").elements(), vec!["a"]);
        let list = FieldValue::List(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(list.elements(), vec!["a", "b"]);
        assert_eq!(list.join("|"), "a|b");
    }

    #[test]
    fn test_field_value_is_empty() {
        assert!(FieldValue::from("").is_empty());
        assert!(FieldValue::List(Vec::new()).is_empty());
        assert!(!FieldValue::from("x").is_empty());
    }

    #[test]
    fn test_stored_value_represent() {
        let plain = StoredPropertyValue {
            value: "cotton".to_string(),
            static_value: None,
        };
        assert_eq!(plain.represent(Representation::Id), "cotton");

        let closed = StoredPropertyValue {
            value: "4".to_string(),
            static_value: Some(PropertyStaticValue {
                id: 4,
                property_id: 1,
                name: "Blue".to_string(),
                value: "blue".to_string(),
                slug: "blue".to_string(),
                sort_order: 0,
                title_append: String::new(),
            }),
        };
        assert_eq!(closed.represent(Representation::Text), "Blue");
        assert_eq!(closed.represent(Representation::Id), "4");
        assert_eq!(closed.display(), "blue");
    }
}
