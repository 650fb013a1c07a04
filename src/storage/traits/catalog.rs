//! Schema catalog trait.

use crate::Result;
use crate::models::{
    AttributeDef, NewProperty, NewPropertyGroup, NewStaticValue, ObjectType, ObjectTypeId,
    Property, PropertyGroup, PropertyHandler, PropertyStaticValue,
};

/// Lookup and creation of object types, property groups, properties,
/// handlers and static values.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait SchemaCatalog: Send + Sync {
    // =========================================================================
    // Object Types
    // =========================================================================

    /// Gets an object type by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn object_type(&self, id: ObjectTypeId) -> Result<Option<ObjectType>>;

    /// Registers an object type.
    ///
    /// # Errors
    ///
    /// Returns an error if the attribute list is invalid or storage cannot be
    /// accessed.
    fn create_object_type(
        &self,
        name: &str,
        record_class: Option<&str>,
        attributes: &[AttributeDef],
    ) -> Result<ObjectType>;

    // =========================================================================
    // Property Groups
    // =========================================================================

    /// Lists the property groups of an object type in sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn property_groups(&self, object_type_id: ObjectTypeId) -> Result<Vec<PropertyGroup>>;

    /// Finds the first property group of an object type whose name starts
    /// with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn find_property_group_by_prefix(
        &self,
        object_type_id: ObjectTypeId,
        prefix: &str,
    ) -> Result<Option<PropertyGroup>>;

    /// Creates a property group at the end of the type's group list.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if the name is blank or the object
    /// type does not exist.
    fn create_property_group(&self, group: &NewPropertyGroup) -> Result<PropertyGroup>;

    // =========================================================================
    // Properties
    // =========================================================================

    /// Lists the properties of a group in sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn properties_for_group(&self, group_id: i64) -> Result<Vec<Property>>;

    /// Gets a property by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn property(&self, id: i64) -> Result<Option<Property>>;

    /// Finds a property by key among all groups of an object type.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn find_property_by_key(
        &self,
        object_type_id: ObjectTypeId,
        key: &str,
    ) -> Result<Option<Property>>;

    /// Creates a property at the end of its group.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if the key is blank, already used
    /// by the object type, or the group does not exist.
    fn create_property(&self, property: &NewProperty) -> Result<Property>;

    // =========================================================================
    // Handlers
    // =========================================================================

    /// Finds a property handler by name.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn find_handler_by_name(&self, name: &str) -> Result<Option<PropertyHandler>>;

    /// Registers a property handler (returns the existing one for a known name).
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn create_handler(&self, name: &str) -> Result<PropertyHandler>;

    // =========================================================================
    // Static Values
    // =========================================================================

    /// Lists the static values of a property in sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn static_values(&self, property_id: i64) -> Result<Vec<PropertyStaticValue>>;

    /// Creates a static value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if the property does not exist.
    fn create_static_value(&self, value: &NewStaticValue) -> Result<PropertyStaticValue>;
}
