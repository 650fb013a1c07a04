//! Property value store trait.

use std::collections::BTreeMap;

use crate::Result;
use crate::models::{FieldValue, ObjectPropertyGroup, ObjectType, ObjectTypeId, PropertyValueSet};

/// Storage for group links and property values of records.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait PropertyValueStore: Send + Sync {
    /// Attaches a property group to a record.
    ///
    /// # Returns
    ///
    /// True if the link was created, false if it already existed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if the group does not exist.
    fn attach_group(&self, link: ObjectPropertyGroup) -> Result<bool>;

    /// Lists the property group IDs attached to a record.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn record_groups(&self, object_type_id: ObjectTypeId, record_id: i64) -> Result<Vec<i64>>;

    /// Saves property values of a record in one batch.
    ///
    /// `values` is keyed by property key. Only properties belonging to a group
    /// attached to the record are written; each written property's previous
    /// values are replaced.
    ///
    /// # Returns
    ///
    /// Number of properties written.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn save_properties(
        &self,
        object_type: &ObjectType,
        record_id: i64,
        form_id: &str,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<usize>;

    /// Returns the stored values of one property on a record.
    ///
    /// # Returns
    ///
    /// `None` if the record has no value for the property.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn property_values(
        &self,
        object_type_id: ObjectTypeId,
        record_id: i64,
        property_id: i64,
    ) -> Result<Option<PropertyValueSet>>;
}
