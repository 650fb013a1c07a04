//! Storage layer abstraction.
//!
//! The engine works against the traits in [`traits`]; [`SqliteStore`] is the
//! bundled implementation.

// Dropping the connection guard early gives nothing inside a single statement.
#![allow(clippy::significant_drop_tightening)]

pub mod sqlite;
pub mod traits;

pub use sqlite::SqliteStore;
pub use traits::{
    PropertyValueStore, RecordStore, SchemaCatalog, Store, TransactionScope, Transactional,
};
