//! Per-object-type record hooks.
//!
//! Record types may opt into extra behaviour during import and export. Each
//! capability is a separate trait; a [`HookRegistry`] maps object types to
//! the capabilities they implement.
//!
//! | Capability | Called by | When |
//! |------------|-----------|------|
//! | [`PreSaveHook`] | save pipeline | before the record is persisted |
//! | [`PostSaveHook`] | save pipeline | after properties are written |
//! | [`CacheInvalidator`] | save pipeline | last step of every saved row |
//! | [`AdditionalFieldsProvider`] | export walker | once per exported record |
//!
//! Types without a registered capability skip the step.

mod registry;

pub use registry::{HookRegistry, RecordCapabilities, RecordTagInvalidator, record_tag};

use std::collections::BTreeMap;

use crate::Result;
use crate::cache::CacheStore;
use crate::models::{AdditionalFieldSpec, FieldValue, ObjectRecord};

/// The raw row being imported, as seen by hooks.
#[derive(Debug, Clone, Copy)]
pub struct ImportRowContext<'a> {
    /// Every cell of the row keyed by its column title.
    pub row: &'a BTreeMap<String, String>,
    /// Multi-value delimiter of the job, if any.
    pub delimiter: Option<&'a str>,
    /// Computed-field configuration of the job.
    pub additional_fields: &'a [AdditionalFieldSpec],
}

/// Normalizes a record before it is persisted.
pub trait PreSaveHook: Send + Sync {
    /// Adjusts the record using the raw row.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the row (and the file).
    fn before_save(&self, record: &mut ObjectRecord, context: &ImportRowContext<'_>) -> Result<()>;
}

/// Runs follow-up work once a record and its properties are saved.
pub trait PostSaveHook: Send + Sync {
    /// Handles a saved record.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the row (and the file).
    fn after_save(&self, record: &ObjectRecord, context: &ImportRowContext<'_>) -> Result<()>;
}

/// Drops cache entries derived from a record.
pub trait CacheInvalidator: Send + Sync {
    /// Invalidates every tag the record contributes to.
    fn invalidate(&self, record: &ObjectRecord, cache: &dyn CacheStore);
}

/// Supplies computed export columns.
pub trait AdditionalFieldsProvider: Send + Sync {
    /// Returns computed values keyed by column title.
    ///
    /// Keys missing from the result export as empty cells.
    ///
    /// # Errors
    ///
    /// Returns an error to abort the export.
    fn additional_fields(
        &self,
        record: &ObjectRecord,
        specs: &[AdditionalFieldSpec],
    ) -> Result<BTreeMap<String, FieldValue>>;
}
