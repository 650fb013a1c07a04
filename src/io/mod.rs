//! Import/export engine.
//!
//! Moves object records between header-driven files and the EAV store.
//!
//! # Architecture
//!
//! - **Field resolution** ([`FieldResolver`]) lists the native attributes and
//!   property keys of an object type
//! - **Codecs** ([`formats`]) read and write rows, one row at a time
//! - **Row mapping** ([`RowMapper`]) splits a row into attributes, property
//!   values and unmapped columns
//! - **Save pipeline** ([`ObjectSavePipeline`]) persists one mapped row
//! - **Services** run whole files: imports inside one transaction, exports
//!   in fixed-size batches
//!
//! # Supported Codecs
//!
//! | Codec | Delimiter | Line ending | Notes |
//! |-------|-----------|-------------|-------|
//! | `csv` | `,` | LF | UTF-8 only |
//! | `excelCsv` | `;` | CRLF | UTF-8 BOM, Windows-1251 fallback on import |
//!
//! # Examples
//!
//! ```rust,ignore
//! use eavio::io::{ExportService, JobRequest};
//!
//! let request = JobRequest::from_job(&job, store.as_ref())?;
//! let result = service.export_file(&config.resolve_export_path(&request.filename)?, &request)?;
//! println!("Exported {} records", result.exported);
//! ```

pub mod fields;
pub mod formats;
pub mod mapper;
pub mod pipeline;
pub mod services;

// Re-exports for convenience
pub use fields::FieldResolver;
pub use formats::{CodecKind, RowSink, RowSource};
pub use mapper::{Delimiter, MappedRow, RowMapper};
pub use pipeline::{ObjectSavePipeline, SaveOutcome};
pub use services::JobRequest;
pub use services::export::{ExportResult, ExportService};
pub use services::import::{ImportResult, ImportService};
