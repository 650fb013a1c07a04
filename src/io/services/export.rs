//! Export service.
//!
//! Walks the records of an object type in id order, one batch at a time, and
//! streams each row straight to the codec.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::hooks::HookRegistry;
use crate::io::formats::{RowSink, create_row_sink};
use crate::io::mapper::INTERNAL_ID;
use crate::io::services::JobRequest;
use crate::models::{FieldValue, ObjectRecord, PropertyFieldSpec};
use crate::storage::{PropertyValueStore, RecordStore, Store};
use crate::{Error, Result};

/// Default number of records fetched per batch.
pub const DEFAULT_BATCH_SIZE: usize = 25;

/// Result of an export operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportResult {
    /// Records written, excluding the header.
    pub exported: usize,
}

impl ExportResult {
    /// Returns whether any record was exported.
    #[must_use]
    pub const fn has_exports(&self) -> bool {
        self.exported > 0
    }
}

/// Service for exporting records to files.
pub struct ExportService {
    store: Arc<dyn Store>,
    hooks: Arc<HookRegistry>,
    batch_size: usize,
}

impl ExportService {
    /// Creates a new export service.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, hooks: Arc<HookRegistry>) -> Self {
        Self {
            store,
            hooks,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the number of records fetched per batch.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Exports records to a file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn export_file(&self, path: &Path, request: &JobRequest) -> Result<ExportResult> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::operation("create_export_dir", e))?;
        }
        let file =
            std::fs::File::create(path).map_err(|e| Error::operation("create_export_file", e))?;
        let writer = std::io::BufWriter::new(file);
        self.export_to_writer(writer, request)
    }

    /// Exports records to a writer using the request's codec.
    ///
    /// # Errors
    ///
    /// Returns an error if reading records or writing rows fails.
    pub fn export_to_writer<W: Write + 'static>(
        &self,
        writer: W,
        request: &JobRequest,
    ) -> Result<ExportResult> {
        let mut sink = create_row_sink(writer, request.codec)?;
        let result = self.export_to_sink(sink.as_mut(), request)?;
        sink.finish()?;
        Ok(result)
    }

    /// Writes the header and every record of the object type to a sink.
    ///
    /// Object types without a record class export nothing, not even a
    /// header.
    ///
    /// # Errors
    ///
    /// Returns an error if reading records or writing rows fails.
    pub fn export_to_sink(&self, sink: &mut dyn RowSink, request: &JobRequest) -> Result<ExportResult> {
        let object_type = &request.object_type;
        let mut result = ExportResult::default();
        if !request.is_transferable() {
            tracing::warn!(
                object_type = %object_type.id,
                "Object type has no record class, nothing to export"
            );
            return Ok(result);
        }

        let start = Instant::now();
        sink.write_header(&header(request))?;

        let mut after_id = 0;
        loop {
            let batch = self
                .store
                .records_page(object_type, after_id, self.batch_size)?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            for record in &batch {
                sink.write_row(&self.row(record, request)?)?;
                result.exported += 1;
            }
            metrics::counter!("eavio_export_rows_total").increment(batch.len() as u64);
            tracing::debug!(
                object_type = %object_type.id,
                batch = batch.len(),
                after_id,
                "Exported batch"
            );
            if batch.len() < self.batch_size {
                break;
            }
        }

        tracing::info!(
            object_type = %object_type.id,
            file = %request.filename,
            exported = result.exported,
            duration_ms = start.elapsed().as_millis(),
            "Export completed"
        );
        Ok(result)
    }

    fn row(&self, record: &ObjectRecord, request: &JobRequest) -> Result<Vec<String>> {
        let mut cells = Vec::with_capacity(
            request.object_fields.len()
                + 1
                + request.property_fields.len()
                + request.additional_fields.len(),
        );

        for field in &request.object_fields {
            cells.push(record.get(field).unwrap_or_default().to_string());
        }
        cells.push(record.id.to_string());

        for spec in &request.property_fields {
            cells.push(self.property_cell(record, spec, request.join_delimiter())?);
        }

        if !request.additional_fields.is_empty() {
            let computed = match &self
                .hooks
                .capabilities(record.object_type_id)
                .additional_fields
            {
                Some(provider) => provider.additional_fields(record, &request.additional_fields)?,
                None => BTreeMap::new(),
            };
            for spec in &request.additional_fields {
                let cell = computed
                    .get(&spec.key)
                    .filter(|_| spec.enabled)
                    .map(|value| value.join(request.join_delimiter()))
                    .unwrap_or_default();
                cells.push(cell);
            }
        }

        Ok(cells)
    }

    fn property_cell(
        &self,
        record: &ObjectRecord,
        spec: &PropertyFieldSpec,
        delimiter: &str,
    ) -> Result<String> {
        let Some(set) =
            self.store
                .property_values(record.object_type_id, record.id, spec.property_id)?
        else {
            return Ok(String::new());
        };

        let value = if set.is_multiple() {
            match spec.process_values_as {
                Some(representation) => FieldValue::List(
                    set.values
                        .iter()
                        .map(|v| v.represent(representation))
                        .collect(),
                )
                .join(delimiter),
                None => String::new(),
            }
        } else {
            set.values
                .first()
                .map(|v| {
                    spec.process_values_as
                        .map_or_else(|| v.display(), |representation| v.represent(representation))
                })
                .unwrap_or_default()
        };
        Ok(value)
    }
}

/// Builds the title row: native fields, `internal_id`, property keys, then
/// additional field keys.
fn header(request: &JobRequest) -> Vec<String> {
    request
        .object_fields
        .iter()
        .cloned()
        .chain(std::iter::once(INTERNAL_ID.to_string()))
        .chain(request.property_fields.iter().map(|spec| spec.key.clone()))
        .chain(request.additional_fields.iter().map(|spec| spec.key.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{AdditionalFieldsProvider, RecordCapabilities};
    use crate::io::formats::CodecKind;
    use crate::io::mapper::Delimiter;
    use crate::models::{
        AdditionalFieldSpec, AttributeDef, NewProperty, NewPropertyGroup, NewStaticValue,
        ObjectPropertyGroup, Representation,
    };
    use crate::storage::{SchemaCatalog, SqliteStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct RecordingSink {
        rows: Vec<Vec<String>>,
    }

    impl RowSink for RecordingSink {
        fn write_header(&mut self, titles: &[String]) -> Result<()> {
            self.rows.push(titles.to_vec());
            Ok(())
        }

        fn write_row(&mut self, cells: &[String]) -> Result<()> {
            self.rows.push(cells.to_vec());
            Ok(())
        }

        fn finish(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        store: Arc<SqliteStore>,
        request: JobRequest,
        color_id: i64,
    }

    fn setup(records: usize) -> Fixture {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let ty = store
            .create_object_type(
                "Product",
                Some("Product"),
                &[AttributeDef::new("id"), AttributeDef::new("name")],
            )
            .unwrap();
        let group = store
            .create_property_group(&NewPropertyGroup {
                object_type_id: ty.id,
                name: "Main".to_string(),
                hidden: false,
            })
            .unwrap();
        let handler = store.create_handler("Text").unwrap();
        let mut color = NewProperty::text_column(group.id, handler.id, "color");
        color.has_static_values = true;
        let color = store.create_property(&color).unwrap();
        let red = store
            .create_static_value(&NewStaticValue::from_text(color.id, "Red"))
            .unwrap();
        let blue = store
            .create_static_value(&NewStaticValue::from_text(color.id, "Blue"))
            .unwrap();

        for i in 0..records {
            let mut record = ObjectRecord::with_defaults(&ty);
            record.set("name", format!("Item {i}"));
            store.save_record(&ty, &mut record).unwrap();
            store
                .attach_group(ObjectPropertyGroup {
                    object_type_id: ty.id,
                    object_model_id: record.id,
                    property_group_id: group.id,
                })
                .unwrap();
            let ids = if i % 2 == 0 {
                vec![red.id.to_string(), blue.id.to_string()]
            } else {
                vec![red.id.to_string()]
            };
            store
                .save_properties(
                    &ty,
                    record.id,
                    &record.form_identifier(&ty),
                    &BTreeMap::from([("color".to_string(), FieldValue::List(ids))]),
                )
                .unwrap();
        }

        let request = JobRequest {
            object_type: ty,
            codec: CodecKind::Csv,
            filename: "products.csv".to_string(),
            object_fields: vec!["name".to_string()],
            property_fields: vec![PropertyFieldSpec {
                property_id: color.id,
                key: "color".to_string(),
                process_values_as: Some(Representation::Text),
            }],
            additional_fields: Vec::new(),
            delimiter: Some(Delimiter::parse(";").unwrap()),
            add_property_groups: Vec::new(),
            create_if_not_exists: false,
        };
        Fixture {
            store,
            request,
            color_id: color.id,
        }
    }

    fn export(service: &ExportService, request: &JobRequest) -> Vec<Vec<String>> {
        let mut sink = RecordingSink::default();
        service.export_to_sink(&mut sink, request).unwrap();
        sink.rows
    }

    #[test]
    fn test_header_and_rows() {
        let f = setup(2);
        let service = ExportService::new(f.store.clone(), Arc::new(HookRegistry::new()));
        let rows = export(&service, &f.request);

        assert_eq!(rows[0], vec!["name", "internal_id", "color"]);
        assert_eq!(rows[1], vec!["Item 0", "1", "Red;Blue"]);
        assert_eq!(rows[2], vec!["Item 1", "2", "Red"]);
    }

    #[test]
    fn test_multiple_values_without_representation_are_blank() {
        let mut f = setup(2);
        f.request.property_fields[0].process_values_as = None;
        let service = ExportService::new(f.store.clone(), Arc::new(HookRegistry::new()));
        let rows = export(&service, &f.request);

        assert_eq!(rows[1][2], "");
        assert_eq!(rows[2][2], "Red");
        assert_eq!(f.color_id, f.request.property_fields[0].property_id);
    }

    #[test]
    fn test_batches_cover_every_record() {
        let f = setup(7);
        let service =
            ExportService::new(f.store.clone(), Arc::new(HookRegistry::new())).with_batch_size(3);
        let result = {
            let mut sink = RecordingSink::default();
            let result = service.export_to_sink(&mut sink, &f.request).unwrap();
            let ids: Vec<&str> = sink.rows[1..].iter().map(|r| r[1].as_str()).collect();
            assert_eq!(ids, vec!["1", "2", "3", "4", "5", "6", "7"]);
            result
        };
        assert_eq!(result.exported, 7);
        assert!(result.has_exports());
    }

    #[test]
    fn test_empty_type_writes_header_only() {
        let f = setup(0);
        let service = ExportService::new(f.store.clone(), Arc::new(HookRegistry::new()));
        let rows = export(&service, &f.request);
        assert_eq!(rows.len(), 1);
    }

    struct Badges {
        calls: AtomicUsize,
    }

    impl AdditionalFieldsProvider for Badges {
        fn additional_fields(
            &self,
            record: &ObjectRecord,
            _specs: &[AdditionalFieldSpec],
        ) -> Result<BTreeMap<String, FieldValue>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(BTreeMap::from([
                (
                    "badges".to_string(),
                    FieldValue::List(vec!["new".to_string(), format!("#{}", record.id)]),
                ),
                ("url".to_string(), FieldValue::Scalar("/p".to_string())),
            ]))
        }
    }

    #[test]
    fn test_additional_fields() {
        let mut f = setup(2);
        f.request.additional_fields = vec![
            AdditionalFieldSpec {
                key: "badges".to_string(),
                enabled: true,
            },
            AdditionalFieldSpec {
                key: "url".to_string(),
                enabled: false,
            },
            AdditionalFieldSpec {
                key: "missing".to_string(),
                enabled: true,
            },
        ];
        let badges = Arc::new(Badges {
            calls: AtomicUsize::new(0),
        });
        let hooks = HookRegistry::new().with(
            f.request.object_type.id,
            RecordCapabilities::new().with_additional_fields(badges.clone()),
        );
        let service = ExportService::new(f.store.clone(), Arc::new(hooks));
        let rows = export(&service, &f.request);

        assert_eq!(rows[0], vec!["name", "internal_id", "color", "badges", "url", "missing"]);
        assert_eq!(rows[1][3..], ["new;#1", "", ""]);
        assert_eq!(badges.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_export_file_creates_directories() {
        let f = setup(1);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("products.csv");
        let service = ExportService::new(f.store.clone(), Arc::new(HookRegistry::new()));

        let result = service.export_file(&path, &f.request).unwrap();
        assert_eq!(result.exported, 1);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "name,internal_id,color\nItem 0,1,Red;Blue\n");
    }
}
