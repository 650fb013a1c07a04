//! Logging initialisation.
//!
//! Installs a `tracing-subscriber` fmt layer filtered by `EAVIO_LOG` (or
//! `RUST_LOG`), in human-readable or JSON form.

use std::str::FromStr;
use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{Error, Result};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "EAVIO_LOG";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::Configuration(format!("unknown log format '{other}'"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Whether `--verbose` was requested.
    pub verbose: bool,
    /// Explicit filter directive, overriding the environment.
    pub filter: Option<String>,
}

impl LoggingConfig {
    /// Builds the configuration from the environment.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        let filter = std::env::var(LOG_ENV)
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok()
            .filter(|f| !f.trim().is_empty());
        Self {
            format: LogFormat::default(),
            verbose,
            filter,
        }
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Returns the filter directive in effect.
    #[must_use]
    pub fn directive(&self) -> String {
        match (&self.filter, self.verbose) {
            (Some(filter), _) => filter.clone(),
            (None, true) => "debug".to_string(),
            (None, false) => "info".to_string(),
        }
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(self.directive())
            .map_err(|e| Error::Configuration(format!("invalid log filter: {e}")))
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout stays free
/// for command output.
///
/// # Errors
///
/// Returns an error if logging was already initialized or the filter is
/// invalid.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::operation(
            "logging_init",
            "logging already initialized",
        ));
    }
    let filter = config.env_filter()?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_target(true),
            )
            .with(filter)
            .try_init()
            .map_err(|e| Error::operation("logging_init", e))?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false),
            )
            .with(filter)
            .try_init()
            .map_err(|e| Error::operation("logging_init", e))?,
    }

    LOGGING_INIT
        .set(())
        .map_err(|()| Error::operation("logging_init", "logging already initialized"))
}
