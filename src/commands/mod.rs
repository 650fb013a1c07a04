//! Command handlers module.
//!
//! - `io.rs`: import, export and field listing

mod io;

pub use io::{Runtime, cmd_export, cmd_fields, cmd_import};
