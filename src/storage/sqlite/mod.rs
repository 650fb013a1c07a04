//! `SQLite` storage backend.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition with poison recovery and connection pragmas
//! - `schema`: table definitions
//! - `store`: [`SqliteStore`], transactions and object records
//! - `catalog`: object types, property groups, properties and static values
//! - `values`: group links and property values
//! - [`metrics`]: operation metrics recording

mod catalog;
pub mod connection;
pub mod metrics;
mod schema;
mod store;
mod values;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
pub use schema::initialize_schema;
pub use store::SqliteStore;
