//! `SQLite` store: connection ownership, transactions and object records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use rusqlite::{Connection, OptionalExtension, params};

use super::connection::{acquire_lock, configure_connection};
use super::metrics::record_operation_metrics;
use super::schema::initialize_schema;
use crate::models::{ObjectRecord, ObjectType, ObjectTypeId};
use crate::storage::traits::{RecordStore, TransactionScope, Transactional};
use crate::{Error, Result, current_timestamp};

/// SQLite-backed implementation of every storage trait.
///
/// A single connection behind a mutex serves all operations, so a
/// transaction opened with [`Transactional::begin`] covers every write made
/// through the store until it is committed or dropped.
pub struct SqliteStore {
    /// Database connection (mutex for interior mutability).
    conn: Mutex<Connection>,
    /// Database file, `None` for in-memory stores.
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_database_dir", e))?;
        }
        let conn = Connection::open(path).map_err(|e| Error::operation("open_database", e))?;
        Self::from_connection(conn, Some(path.to_path_buf()))
    }

    /// Creates an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_database_memory", e))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        configure_connection(&conn)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Returns the database path, if file-backed.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Locks the connection.
    pub(super) fn conn(&self) -> MutexGuard<'_, Connection> {
        acquire_lock(&self.conn)
    }

    /// Runs raw SQL on the connection.
    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<()> {
        self.conn()
            .execute_batch(sql)
            .map_err(|e| Error::operation("execute_raw", e))
    }

    /// Gets the current Unix timestamp as i64 (for `SQLite` compatibility).
    #[allow(clippy::cast_possible_wrap)]
    pub(super) fn now() -> i64 {
        current_timestamp() as i64
    }

    /// Converts a page size to an `SQLite` limit.
    pub(super) fn to_db_limit(limit: usize) -> i64 {
        i64::try_from(limit).unwrap_or(i64::MAX)
    }

    /// Decodes a JSON column inside a row mapper.
    pub(super) fn json_column<T: serde::de::DeserializeOwned>(
        row: &rusqlite::Row<'_>,
        idx: usize,
    ) -> rusqlite::Result<T> {
        let raw: String = row.get(idx)?;
        serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    }

    /// Checks a record against its type declaration.
    fn validate_record(object_type: &ObjectType, record: &ObjectRecord) -> Vec<String> {
        let mut errors = Vec::new();

        for name in record.attributes.keys() {
            if name == ObjectType::ID_ATTRIBUTE || object_type.attribute(name).is_none() {
                errors.push(format!("unknown attribute '{name}'"));
            }
        }
        for attribute in object_type.attributes.iter().filter(|a| a.required) {
            let blank = record
                .get(&attribute.name)
                .is_none_or(|v| v.trim().is_empty());
            if blank {
                errors.push(format!("{} cannot be blank", attribute.name));
            }
        }

        errors
    }

    fn save_record_inner(&self, object_type: &ObjectType, record: &mut ObjectRecord) -> Result<()> {
        let errors = Self::validate_record(object_type, record);
        if !errors.is_empty() {
            return Err(Error::Validation {
                entity: object_type.form_name().to_string(),
                errors,
                attributes: record.attributes.clone(),
            });
        }

        let attributes = serde_json::to_string(&record.attributes)
            .map_err(|e| Error::operation("serialize_record_attributes", e))?;
        let type_id = object_type.id.get();
        let now = Self::now();
        let conn = self.conn();

        let id = if record.is_new() {
            let id = if record.id > 0 {
                let taken: Option<i64> = conn
                    .query_row(
                        "SELECT id FROM object_records WHERE object_type_id = ?1 AND id = ?2",
                        params![type_id, record.id],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(|e| Error::operation("check_record_id", e))?;
                if taken.is_some() {
                    return Err(Error::Validation {
                        entity: object_type.form_name().to_string(),
                        errors: vec![format!("id {} has already been taken", record.id)],
                        attributes: record.attributes.clone(),
                    });
                }
                record.id
            } else {
                conn.query_row(
                    "SELECT COALESCE(MAX(id), 0) + 1 FROM object_records WHERE object_type_id = ?1",
                    params![type_id],
                    |row| row.get(0),
                )
                .map_err(|e| Error::operation("next_record_id", e))?
            };

            conn.execute(
                "INSERT INTO object_records (object_type_id, id, attributes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![type_id, id, attributes, now],
            )
            .map_err(|e| Error::operation("insert_record", e))?;
            id
        } else {
            let rows = conn
                .execute(
                    "UPDATE object_records SET attributes = ?3, updated_at = ?4
                     WHERE object_type_id = ?1 AND id = ?2",
                    params![type_id, record.id, attributes, now],
                )
                .map_err(|e| Error::operation("update_record", e))?;
            if rows == 0 {
                return Err(Error::NotFound {
                    entity: "object record",
                    id: record.id.to_string(),
                });
            }
            record.id
        };

        record.mark_persisted(id);
        Ok(())
    }
}

/// Open transaction on a [`SqliteStore`].
struct SqliteTransaction<'a> {
    store: &'a SqliteStore,
    finished: bool,
}

impl TransactionScope for SqliteTransaction<'_> {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        let conn = self.store.conn();
        if let Err(e) = conn.execute_batch("COMMIT") {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(Error::operation("commit_transaction", e));
        }
        tracing::debug!("Transaction committed");
        Ok(())
    }

    fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finished = true;
        self.store
            .conn()
            .execute_batch("ROLLBACK")
            .map_err(|e| Error::operation("rollback_transaction", e))?;
        tracing::debug!("Transaction rolled back");
        Ok(())
    }
}

impl Drop for SqliteTransaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.store.conn().execute_batch("ROLLBACK") {
            Ok(()) => tracing::debug!("Transaction rolled back on drop"),
            Err(e) => tracing::warn!(error = %e, "Failed to roll back dropped transaction"),
        }
    }
}

impl Transactional for SqliteStore {
    fn begin(&self) -> Result<Box<dyn TransactionScope + '_>> {
        self.conn()
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| Error::operation("begin_transaction", e))?;
        Ok(Box::new(SqliteTransaction {
            store: self,
            finished: false,
        }))
    }
}

impl RecordStore for SqliteStore {
    fn find_record(&self, object_type: &ObjectType, id: i64) -> Result<Option<ObjectRecord>> {
        let type_id = object_type.id;
        self.conn()
            .query_row(
                "SELECT attributes FROM object_records WHERE object_type_id = ?1 AND id = ?2",
                params![type_id.get(), id],
                |row| {
                    let attributes: BTreeMap<String, String> = Self::json_column(row, 0)?;
                    Ok(ObjectRecord::persisted(id, type_id, attributes))
                },
            )
            .optional()
            .map_err(|e| Error::operation("find_record", e))
    }

    fn save_record(&self, object_type: &ObjectType, record: &mut ObjectRecord) -> Result<()> {
        let start = Instant::now();
        let result = self.save_record_inner(object_type, record);
        record_operation_metrics("save_record", start, result.is_ok());
        result
    }

    fn records_page(
        &self,
        object_type: &ObjectType,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<ObjectRecord>> {
        let start = Instant::now();
        let type_id = object_type.id;
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, attributes FROM object_records
                 WHERE object_type_id = ?1 AND id > ?2
                 ORDER BY id LIMIT ?3",
            )
            .map_err(|e| Error::operation("prepare_records_page", e))?;

        let records = stmt
            .query_map(
                params![type_id.get(), after_id, Self::to_db_limit(limit)],
                |row| {
                    let id: i64 = row.get(0)?;
                    let attributes: BTreeMap<String, String> = Self::json_column(row, 1)?;
                    Ok(ObjectRecord::persisted(id, type_id, attributes))
                },
            )
            .map_err(|e| Error::operation("records_page", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::operation("collect_records_page", e));

        record_operation_metrics("records_page", start, records.is_ok());
        records
    }

    fn count_records(&self, object_type_id: ObjectTypeId) -> Result<u64> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM object_records WHERE object_type_id = ?1",
                params![object_type_id.get()],
                |row| row.get(0),
            )
            .map_err(|e| Error::operation("count_records", e))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeDef;
    use crate::storage::traits::SchemaCatalog;

    fn setup() -> (SqliteStore, ObjectType) {
        let store = SqliteStore::in_memory().unwrap();
        let ty = store
            .create_object_type(
                "Product",
                Some("catalog.Product"),
                &[
                    AttributeDef::new("id"),
                    AttributeDef::new("name").required(),
                    AttributeDef::new("price").with_default("0"),
                ],
            )
            .unwrap();
        (store, ty)
    }

    fn product(ty: &ObjectType, name: &str) -> ObjectRecord {
        let mut record = ObjectRecord::with_defaults(ty);
        record.set("name", name);
        record
    }

    #[test]
    fn test_save_assigns_sequential_ids() {
        let (store, ty) = setup();
        let mut a = product(&ty, "A");
        let mut b = product(&ty, "B");
        store.save_record(&ty, &mut a).unwrap();
        store.save_record(&ty, &mut b).unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(!a.is_new());
        assert_eq!(store.count_records(ty.id).unwrap(), 2);
    }

    #[test]
    fn test_save_with_preseeded_id() {
        let (store, ty) = setup();
        let mut record = ObjectRecord::with_id(&ty, 40);
        record.set("name", "Seeded");
        store.save_record(&ty, &mut record).unwrap();
        assert_eq!(record.id, 40);

        let mut next = product(&ty, "Next");
        store.save_record(&ty, &mut next).unwrap();
        assert_eq!(next.id, 41);

        let mut clash = ObjectRecord::with_id(&ty, 40);
        clash.set("name", "Clash");
        assert!(matches!(
            store.save_record(&ty, &mut clash),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_update_existing_record() {
        let (store, ty) = setup();
        let mut record = product(&ty, "Old");
        store.save_record(&ty, &mut record).unwrap();

        let mut loaded = store.find_record(&ty, record.id).unwrap().unwrap();
        loaded.set("name", "New");
        store.save_record(&ty, &mut loaded).unwrap();

        let reloaded = store.find_record(&ty, record.id).unwrap().unwrap();
        assert_eq!(reloaded.get("name"), Some("New"));
        assert_eq!(reloaded.get("price"), Some("0"));
        assert_eq!(store.count_records(ty.id).unwrap(), 1);
    }

    #[test]
    fn test_validation_rejects_blank_required_and_unknown() {
        let (store, ty) = setup();
        let mut record = ObjectRecord::with_defaults(&ty);
        record.set("colour", "red");

        let err = store.save_record(&ty, &mut record).unwrap_err();
        match err {
            Error::Validation {
                entity,
                errors,
                attributes,
            } => {
                assert_eq!(entity, "Product");
                assert!(errors.iter().any(|e| e == "name cannot be blank"));
                assert!(errors.iter().any(|e| e.contains("colour")));
                assert_eq!(attributes.get("colour").map(String::as_str), Some("red"));
            },
            other => unreachable!("expected validation error, got {other}"),
        }
        assert_eq!(store.count_records(ty.id).unwrap(), 0);
    }

    #[test]
    fn test_records_page() {
        let (store, ty) = setup();
        for name in ["a", "b", "c", "d", "e"] {
            store.save_record(&ty, &mut product(&ty, name)).unwrap();
        }

        let first = store.records_page(&ty, 0, 2).unwrap();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        let rest = store.records_page(&ty, 4, 10).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].get("name"), Some("e"));
    }

    #[test]
    fn test_transaction_rollback_on_drop() {
        let (store, ty) = setup();
        {
            let _tx = store.begin().unwrap();
            store.save_record(&ty, &mut product(&ty, "gone")).unwrap();
        }
        assert_eq!(store.count_records(ty.id).unwrap(), 0);

        let tx = store.begin().unwrap();
        store.save_record(&ty, &mut product(&ty, "kept")).unwrap();
        tx.commit().unwrap();
        assert_eq!(store.count_records(ty.id).unwrap(), 1);
    }

    #[test]
    fn test_explicit_rollback() {
        let (store, ty) = setup();
        let tx = store.begin().unwrap();
        store.save_record(&ty, &mut product(&ty, "gone")).unwrap();
        tx.rollback().unwrap();
        assert_eq!(store.count_records(ty.id).unwrap(), 0);
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("eavio.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
            let ty = store
                .create_object_type("Page", None, &[AttributeDef::new("id")])
                .unwrap();
            store
                .save_record(&ty, &mut ObjectRecord::with_defaults(&ty))
                .unwrap();
        }
        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.count_records(ObjectTypeId::new(1)).unwrap(), 1);
    }
}
