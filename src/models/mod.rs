//! Data models for eavio.
//!
//! This module contains the schema entities (object types, property groups,
//! properties, static values), object records and the field specifications
//! that drive import and export.

mod fields;
mod record;
pub mod schema;
mod value;

pub use fields::{AdditionalFieldSpec, PropertyFieldSpec, Representation, ResolvedFields};
pub use record::ObjectRecord;
pub use schema::{
    AttributeDef, NewProperty, NewPropertyGroup, NewStaticValue, ObjectPropertyGroup, ObjectType,
    ObjectTypeId, Property, PropertyGroup, PropertyHandler, PropertyStaticValue, ValueType,
};
pub use value::{FieldValue, PropertyValueSet, StoredPropertyValue};
