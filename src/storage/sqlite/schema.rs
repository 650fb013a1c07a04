//! Table definitions for the `SQLite` store.

use rusqlite::Connection;

use crate::{Error, Result};

/// Creates all tables and indexes if they do not exist.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if a statement fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS object_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            record_class TEXT,
            attributes TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS object_records (
            object_type_id INTEGER NOT NULL,
            id INTEGER NOT NULL,
            attributes TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (object_type_id, id),
            FOREIGN KEY (object_type_id) REFERENCES object_types(id)
        );

        CREATE TABLE IF NOT EXISTS property_handlers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS property_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_type_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            hidden INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (object_type_id) REFERENCES object_types(id)
        );

        CREATE INDEX IF NOT EXISTS idx_property_groups_type ON property_groups(object_type_id);

        CREATE TABLE IF NOT EXISTS properties (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            property_group_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            property_key TEXT NOT NULL,
            value_type TEXT NOT NULL DEFAULT 'STRING',
            property_handler_id INTEGER,
            has_static_values INTEGER NOT NULL DEFAULT 0,
            has_slugs_in_values INTEGER NOT NULL DEFAULT 0,
            is_eav INTEGER NOT NULL DEFAULT 0,
            handler_additional_params TEXT NOT NULL DEFAULT '{}',
            sort_order INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (property_group_id) REFERENCES property_groups(id),
            FOREIGN KEY (property_handler_id) REFERENCES property_handlers(id)
        );

        CREATE INDEX IF NOT EXISTS idx_properties_group ON properties(property_group_id);
        CREATE INDEX IF NOT EXISTS idx_properties_key ON properties(property_key);

        CREATE TABLE IF NOT EXISTS property_static_values (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            property_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            slug TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            title_append TEXT NOT NULL DEFAULT '',
            FOREIGN KEY (property_id) REFERENCES properties(id)
        );

        CREATE INDEX IF NOT EXISTS idx_static_values_property ON property_static_values(property_id);

        CREATE TABLE IF NOT EXISTS object_property_groups (
            object_type_id INTEGER NOT NULL,
            object_model_id INTEGER NOT NULL,
            property_group_id INTEGER NOT NULL,
            PRIMARY KEY (object_type_id, object_model_id, property_group_id),
            FOREIGN KEY (property_group_id) REFERENCES property_groups(id)
        );

        CREATE TABLE IF NOT EXISTS property_values (
            object_type_id INTEGER NOT NULL,
            object_model_id INTEGER NOT NULL,
            property_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (object_type_id, object_model_id, property_id, position),
            FOREIGN KEY (property_id) REFERENCES properties(id)
        );
        ",
    )
    .map_err(|e| Error::operation("initialize_schema", e))
}
