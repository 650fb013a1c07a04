//! Record store trait.

use crate::Result;
use crate::models::{ObjectRecord, ObjectType, ObjectTypeId};

/// Storage for object records and their native attributes.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait RecordStore: Send + Sync {
    /// Finds a record by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn find_record(&self, object_type: &ObjectType, id: i64) -> Result<Option<ObjectRecord>>;

    /// Inserts or updates a record after validating it against its type.
    ///
    /// New records with identifier 0 receive the next free identifier; new
    /// records with a pre-seeded identifier keep it. On success the record is
    /// marked as persisted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] if an attribute is undeclared, a
    /// required attribute is blank or a pre-seeded identifier is taken, and an
    /// operation error if storage cannot be accessed.
    fn save_record(&self, object_type: &ObjectType, record: &mut ObjectRecord) -> Result<()>;

    /// Returns up to `limit` records with identifiers greater than `after_id`,
    /// ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn records_page(
        &self,
        object_type: &ObjectType,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<ObjectRecord>>;

    /// Counts the records of an object type.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be accessed.
    fn count_records(&self, object_type_id: ObjectTypeId) -> Result<u64>;
}
