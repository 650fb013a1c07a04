//! # Eavio
//!
//! Bulk import and export of catalog objects whose schema is split between
//! native columns and dynamic EAV properties.
//!
//! Objects belong to an object type. Their fixed attributes live on the
//! record itself, while dynamic attributes are properties grouped into
//! property groups, optionally restricted to a list of static values.
//!
//! ## Features
//!
//! - Header-driven CSV files (plain and Excel-flavoured)
//! - Field resolution per object type, memoized behind tag-invalidated caches
//! - Static value resolution with on-the-fly creation of unseen values
//! - Auto-creation of properties for unmapped columns
//! - All-or-nothing imports: one transaction per file
//! - Streaming exports in fixed-size batches
//!
//! ## Example
//!
//! ```rust,ignore
//! use eavio::io::{FieldResolver, ImportService, JobRequest};
//!
//! let request = JobRequest::from_job(&job, store.as_ref())?;
//! let resolver = FieldResolver::new(store.clone(), cache.clone());
//! let service = ImportService::new(store, cache, hooks, resolver);
//! let result = service.import_file(&path, &request)?;
//! println!("created {} records", result.created);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::collections::BTreeMap;
use thiserror::Error as ThisError;

// Module declarations
pub mod cache;
pub mod config;
pub mod hooks;
pub mod io;
pub mod models;
pub mod observability;
pub mod storage;

// Re-exports for convenience
pub use cache::{CacheStore, MemoryCache};
pub use config::{EavioConfig, JobConfig};
pub use hooks::HookRegistry;
pub use models::{FieldValue, ObjectRecord, ObjectTypeId, PropertyFieldSpec, Representation};
pub use storage::{SqliteStore, Store};

/// Error type for eavio operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Configuration` | Missing or invalid job parameters, unknown codec, bad delimiter pattern |
/// | `Structural` | Row and header cell counts differ, unreadable or undecodable file |
/// | `Validation` | A record, property group, property or static value is rejected by integrity rules |
/// | `NotFound` | A lookup that must succeed finds nothing (e.g. unknown object type) |
/// | `OperationFailed` | `SQLite`, filesystem or serialization failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid or missing configuration.
    ///
    /// Raised before any file or database I/O happens.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The file layout is broken.
    ///
    /// Aborts the current file; the import transaction is rolled back.
    #[error("structural error at line {line}: {message}")]
    Structural {
        /// 1-indexed line number in the source file (0 when unknown).
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// An entity failed integrity checks when persisted.
    ///
    /// Carries the attempted attribute set so the source file can be fixed
    /// without re-running the import with verbose tracing.
    #[error("cannot save {entity}: {} (attributes: {attributes:?})", errors.join("; "))]
    Validation {
        /// The entity kind that was rejected.
        entity: String,
        /// Validation messages.
        errors: Vec<String>,
        /// The attribute set that was being saved.
        attributes: BTreeMap<String, String>,
    },

    /// A required entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// The entity kind.
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: impl Into<String>, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for eavio operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in seconds.
///
/// Falls back to 0 if the system clock is before the Unix epoch.
#[must_use]
pub fn current_timestamp() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Configuration("object_type is not set".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: object_type is not set"
        );

        let err = Error::operation("open_db", "disk full");
        assert_eq!(err.to_string(), "operation 'open_db' failed: disk full");

        let err = Error::Structural {
            line: 4,
            message: "expected 3 cells, found 2".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "structural error at line 4: expected 3 cells, found 2"
        );
    }

    #[test]
    fn test_validation_error_embeds_attributes() {
        let mut attributes = BTreeMap::new();
        attributes.insert("name".to_string(), String::new());
        let err = Error::Validation {
            entity: "product".to_string(),
            errors: vec!["name cannot be blank".to_string()],
            attributes,
        };
        let display = err.to_string();
        assert!(display.contains("cannot save product"));
        assert!(display.contains("name cannot be blank"));
        assert!(display.contains("\"name\""));
    }

    #[test]
    fn test_current_timestamp() {
        assert!(current_timestamp() > 0);
    }
}
