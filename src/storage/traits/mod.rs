//! Storage backend traits.
//!
//! The import/export engine only talks to storage through these traits so the
//! record store, the schema catalog and the property value store can be
//! backed by anything offering find-by-id, create, update-with-validation and
//! paged iteration.

mod catalog;
mod records;
mod transaction;
mod values;

pub use catalog::SchemaCatalog;
pub use records::RecordStore;
pub use transaction::{TransactionScope, Transactional};
pub use values::PropertyValueStore;

/// Everything the import and export services need from storage.
pub trait Store: RecordStore + SchemaCatalog + PropertyValueStore + Transactional {}

impl<T> Store for T where T: RecordStore + SchemaCatalog + PropertyValueStore + Transactional {}
