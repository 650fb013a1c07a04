//! Import service.
//!
//! Reads one file inside one transaction: every row is saved or none is.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::cache::{
    CacheStore, OBJECT_TYPE_ENTITY, PROPERTY_ENTITY, PROPERTY_GROUP_ENTITY, common_tag, object_tag,
};
use crate::hooks::HookRegistry;
use crate::io::fields::FieldResolver;
use crate::io::formats::{RowSource, create_row_source};
use crate::io::mapper::RowMapper;
use crate::io::pipeline::{ObjectSavePipeline, SaveOutcome};
use crate::io::services::JobRequest;
use crate::models::ResolvedFields;
use crate::storage::{Store, TransactionScope, Transactional};
use crate::{Error, Result};

/// Result of an import operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportResult {
    /// Records created.
    pub created: usize,
    /// Existing records updated.
    pub updated: usize,
    /// Rows naming a missing record while creation was disabled.
    pub skipped: usize,
    /// Data rows read, excluding the header.
    pub rows: usize,
}

impl ImportResult {
    fn record(&mut self, outcome: SaveOutcome) {
        self.rows += 1;
        match outcome {
            SaveOutcome::Created(_) => self.created += 1,
            SaveOutcome::Updated(_) => self.updated += 1,
            SaveOutcome::Skipped => self.skipped += 1,
        }
        metrics::counter!("eavio_import_rows_total", "outcome" => outcome.as_str()).increment(1);
    }

    /// Returns whether any record was written.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.created + self.updated > 0
    }
}

/// Service for importing records from files.
pub struct ImportService {
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
    hooks: Arc<HookRegistry>,
    resolver: FieldResolver,
}

impl ImportService {
    /// Creates a new import service.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        cache: Arc<dyn CacheStore>,
        hooks: Arc<HookRegistry>,
        resolver: FieldResolver,
    ) -> Self {
        Self {
            store,
            cache,
            hooks,
            resolver,
        }
    }

    /// Imports records from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] if the file cannot be opened, and any
    /// error of [`Self::import_from_source`].
    pub fn import_file(&self, path: &Path, request: &JobRequest) -> Result<ImportResult> {
        let file = std::fs::File::open(path).map_err(|e| Error::Structural {
            line: 0,
            message: format!("cannot open {}: {e}", path.display()),
        })?;
        let reader = std::io::BufReader::new(file);
        self.import_from_reader(reader, request)
    }

    /// Imports records from a reader using the request's codec.
    ///
    /// # Errors
    ///
    /// See [`Self::import_from_source`].
    pub fn import_from_reader<R: Read + 'static>(
        &self,
        reader: R,
        request: &JobRequest,
    ) -> Result<ImportResult> {
        let mut source = create_row_source(reader, request.codec);
        self.import_from_source(source.as_mut(), request)
    }

    /// Imports every row of a source.
    ///
    /// The first row is the header. Object types without a record class
    /// import nothing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] for unreadable or malformed rows,
    /// [`Error::Validation`] when a record or schema entity is rejected, and
    /// storage errors. On any error every row of the source is rolled back.
    pub fn import_from_source(
        &self,
        source: &mut dyn RowSource,
        request: &JobRequest,
    ) -> Result<ImportResult> {
        let object_type_id = request.object_type.id;
        if !request.is_transferable() {
            tracing::warn!(
                object_type = %object_type_id,
                "Object type has no record class, nothing to import"
            );
            return Ok(ImportResult::default());
        }

        let resolved = self.resolver.resolve_fields(object_type_id)?;
        let fields = mapped_fields(request, &resolved);
        let start = Instant::now();

        let transaction: Box<dyn TransactionScope + '_> = self.store.begin()?;
        let outcome = match self.import_rows(source, request, &fields) {
            Ok(result) => transaction.commit().map(|()| result),
            Err(e) => {
                if let Err(rollback_error) = transaction.rollback() {
                    tracing::error!(error = %rollback_error, "Rollback failed");
                }
                Err(e)
            },
        };

        match outcome {
            Ok(result) => {
                tracing::info!(
                    object_type = %object_type_id,
                    file = %request.filename,
                    rows = result.rows,
                    created = result.created,
                    updated = result.updated,
                    skipped = result.skipped,
                    duration_ms = start.elapsed().as_millis(),
                    "Import completed"
                );
                Ok(result)
            },
            Err(e) => {
                self.forget_rolled_back(request);
                tracing::error!(
                    object_type = %object_type_id,
                    file = %request.filename,
                    line = source.line(),
                    error = %e,
                    "Import failed, all rows rolled back"
                );
                Err(e)
            },
        }
    }

    fn import_rows(
        &self,
        source: &mut dyn RowSource,
        request: &JobRequest,
        fields: &ResolvedFields,
    ) -> Result<ImportResult> {
        let mut result = ImportResult::default();
        let Some(header) = source.next_row()? else {
            tracing::info!(file = %request.filename, "Empty import file");
            return Ok(result);
        };

        let mapper = RowMapper::new(header, fields, request.delimiter.clone());
        let pipeline = ObjectSavePipeline::new(
            self.store.as_ref(),
            self.cache.as_ref(),
            self.hooks.as_ref(),
            request,
            Utc::now(),
        );

        while let Some(cells) = source.next_row()? {
            let row = mapper.map(cells, source.line())?;
            let outcome = pipeline.save(&row)?;
            result.record(outcome);
        }
        Ok(result)
    }

    /// Drops cache entries that may describe rolled back rows.
    fn forget_rolled_back(&self, request: &JobRequest) {
        let mut tags = vec![
            object_tag(OBJECT_TYPE_ENTITY, request.object_type.id),
            common_tag(PROPERTY_GROUP_ENTITY),
            common_tag(PROPERTY_ENTITY),
        ];
        tags.extend(
            request
                .property_fields
                .iter()
                .map(|spec| object_tag(PROPERTY_ENTITY, spec.property_id)),
        );
        self.cache.invalidate_tags(&tags);
    }
}

/// Returns every column the object type claims.
///
/// Native attributes and property keys of the type never reach the
/// auto-created property path, even when the job leaves them out. The
/// pipeline applies the job's attribute whitelist and property specs.
fn mapped_fields(request: &JobRequest, resolved: &ResolvedFields) -> ResolvedFields {
    let mut property_fields = resolved.property_fields.clone();
    for spec in &request.property_fields {
        if !property_fields.contains(&spec.key) {
            property_fields.push(spec.key.clone());
        }
    }
    ResolvedFields {
        object_fields: resolved.object_fields.clone(),
        property_fields,
        additional_fields: Vec::new(),
    }
}
