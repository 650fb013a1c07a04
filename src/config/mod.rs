//! Configuration management.
//!
//! [`EavioConfig`] holds process-wide settings (database location, import and
//! export directories, batch sizes). [`JobConfig`] describes a single import
//! or export invocation.

mod job;

pub use job::{AdditionalFieldConfig, DEFAULT_DELIMITER, JobConfig, PropertyFieldConfig};

use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Main configuration for eavio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EavioConfig {
    /// Path to the `SQLite` database.
    pub database_path: PathBuf,
    /// Directory import file names are resolved against.
    pub import_dir: PathBuf,
    /// Directory export file names are resolved against.
    pub export_dir: PathBuf,
    /// Number of records fetched per export batch.
    pub export_batch_size: usize,
    /// Lifetime of memoized field sets.
    pub field_cache_ttl: Duration,
    /// Maximum number of cache entries.
    pub cache_capacity: usize,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Database path.
    pub database_path: Option<String>,
    /// Import directory.
    pub import_dir: Option<String>,
    /// Export directory.
    pub export_dir: Option<String>,
    /// Export batch size.
    pub export_batch_size: Option<usize>,
    /// Field cache TTL in seconds.
    pub field_cache_ttl_secs: Option<u64>,
    /// Cache capacity.
    pub cache_capacity: Option<usize>,
}

impl Default for EavioConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(".eavio").join("eavio.db"),
            import_dir: PathBuf::from("import"),
            export_dir: PathBuf::from("export"),
            export_batch_size: 25,
            field_cache_ttl: Duration::from_secs(86_400),
            cache_capacity: 1024,
        }
    }
}

impl EavioConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", e))?;
        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Self::from_config_file(file)
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `<platform config dir>/eavio/config.toml`. Returns the default
    /// configuration if no file is found or it cannot be loaded.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(dirs) = directories::ProjectDirs::from("", "", "eavio") else {
            return Self::default();
        };

        let path = dirs.config_dir().join("config.toml");
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            },
        }
    }

    /// Converts a `ConfigFile` to `EavioConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = file.database_path {
            config.database_path = PathBuf::from(path);
        }
        if let Some(dir) = file.import_dir {
            config.import_dir = PathBuf::from(dir);
        }
        if let Some(dir) = file.export_dir {
            config.export_dir = PathBuf::from(dir);
        }
        if let Some(size) = file.export_batch_size {
            if size == 0 {
                return Err(Error::Configuration(
                    "export_batch_size must be positive".to_string(),
                ));
            }
            config.export_batch_size = size;
        }
        if let Some(secs) = file.field_cache_ttl_secs {
            config.field_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = file.cache_capacity {
            config.cache_capacity = capacity;
        }

        Ok(config)
    }

    /// Sets the database path.
    #[must_use]
    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    /// Sets the import directory.
    #[must_use]
    pub fn with_import_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.import_dir = path.into();
        self
    }

    /// Sets the export directory.
    #[must_use]
    pub fn with_export_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_dir = path.into();
        self
    }

    /// Resolves an import file name against the import directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the name is absolute or escapes
    /// the directory.
    pub fn resolve_import_path(&self, filename: &str) -> Result<PathBuf> {
        resolve_within(&self.import_dir, filename)
    }

    /// Resolves an export file name against the export directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the name is absolute or escapes
    /// the directory.
    pub fn resolve_export_path(&self, filename: &str) -> Result<PathBuf> {
        resolve_within(&self.export_dir, filename)
    }
}

fn resolve_within(base: &Path, filename: &str) -> Result<PathBuf> {
    let relative = Path::new(filename);
    if filename.trim().is_empty() {
        return Err(Error::Configuration("filename is not set".to_string()));
    }
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(Error::Configuration(format!(
            "filename '{filename}' must stay inside {}",
            base.display()
        )));
    }
    Ok(base.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EavioConfig::new();
        assert_eq!(config.export_batch_size, 25);
        assert_eq!(config.field_cache_ttl, Duration::from_secs(86_400));
        assert_eq!(config.cache_capacity, 1024);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
database_path = "/var/lib/eavio/data.db"
import_dir = "/srv/import"
export_batch_size = 100
field_cache_ttl_secs = 60
"#
        )
        .unwrap();

        let config = EavioConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/eavio/data.db"));
        assert_eq!(config.import_dir, PathBuf::from("/srv/import"));
        assert_eq!(config.export_dir, PathBuf::from("export"));
        assert_eq!(config.export_batch_size, 100);
        assert_eq!(config.field_cache_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "export_batch_size = 0").unwrap();
        assert!(matches!(
            EavioConfig::load_from_file(file.path()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "colour = \"red\"").unwrap();
        assert!(EavioConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_resolve_paths() {
        let config = EavioConfig::new().with_import_dir("/srv/in");
        assert_eq!(
            config.resolve_import_path("products.csv").unwrap(),
            PathBuf::from("/srv/in/products.csv")
        );
        assert_eq!(
            config.resolve_import_path("./daily/products.csv").unwrap(),
            PathBuf::from("/srv/in/./daily/products.csv")
        );
        assert!(config.resolve_import_path("../secrets.csv").is_err());
        assert!(config.resolve_import_path("/etc/passwd").is_err());
        assert!(config.resolve_export_path("").is_err());
    }
}
