//! Import, export and field listing command handlers.

use std::path::Path;
use std::sync::Arc;

use eavio::io::{ExportService, FieldResolver, ImportService, JobRequest};
use eavio::models::ObjectTypeId;
use eavio::{CacheStore, EavioConfig, HookRegistry, JobConfig, MemoryCache, Result, SqliteStore, Store};

/// Shared collaborators of one CLI invocation.
pub struct Runtime {
    config: EavioConfig,
    store: Arc<dyn Store>,
    cache: Arc<dyn CacheStore>,
    hooks: Arc<HookRegistry>,
}

impl Runtime {
    /// Opens the database named by the configuration.
    pub fn open(config: EavioConfig) -> Result<Self> {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::new(&config.database_path)?);
        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new(config.cache_capacity));
        Ok(Self {
            config,
            store,
            cache,
            hooks: Arc::new(HookRegistry::new()),
        })
    }

    fn resolver(&self) -> FieldResolver {
        FieldResolver::new(self.store.clone(), self.cache.clone())
            .with_ttl(self.config.field_cache_ttl)
    }

    fn request(&self, job_path: &Path) -> Result<JobRequest> {
        let job = JobConfig::load_from_file(job_path)?;
        JobRequest::from_job(&job, self.store.as_ref())
    }
}

/// Executes the import command.
pub fn cmd_import(runtime: &Runtime, job_path: &Path) -> Result<()> {
    let request = runtime.request(job_path)?;
    let path = runtime.config.resolve_import_path(&request.filename)?;

    let service = ImportService::new(
        runtime.store.clone(),
        runtime.cache.clone(),
        runtime.hooks.clone(),
        runtime.resolver(),
    );
    let result = service.import_file(&path, &request)?;

    println!("Import completed: {}", path.display());
    println!("  Rows:     {}", result.rows);
    println!("  Created:  {}", result.created);
    println!("  Updated:  {}", result.updated);
    println!("  Skipped:  {}", result.skipped);
    if !result.has_changes() {
        println!("  No records were written");
    }
    Ok(())
}

/// Executes the export command.
pub fn cmd_export(runtime: &Runtime, job_path: &Path) -> Result<()> {
    let request = runtime.request(job_path)?;
    let path = runtime.config.resolve_export_path(&request.filename)?;

    let service = ExportService::new(runtime.store.clone(), runtime.hooks.clone())
        .with_batch_size(runtime.config.export_batch_size);
    let result = service.export_file(&path, &request)?;

    println!("Export completed: {}", path.display());
    println!("  Exported: {}", result.exported);
    if !result.has_exports() {
        println!("  No records to export");
    }
    Ok(())
}

/// Lists the importable fields of an object type.
pub fn cmd_fields(runtime: &Runtime, object_type: i64) -> Result<()> {
    let fields = runtime
        .resolver()
        .resolve_fields(ObjectTypeId::new(object_type))?;

    if fields.is_empty() {
        println!("Object type {object_type} has no importable fields");
        return Ok(());
    }
    println!("Object fields:");
    for field in &fields.object_fields {
        println!("  {field}");
    }
    println!("Property fields:");
    for field in &fields.property_fields {
        println!("  {field}");
    }
    Ok(())
}
