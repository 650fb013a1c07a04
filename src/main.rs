//! Binary entry point for eavio.
//!
//! Runs import and export jobs described by TOML job files.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stdout in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use eavio::EavioConfig;
use eavio::observability::{self, LogFormat, LoggingConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use commands::{Runtime, cmd_export, cmd_fields, cmd_import};

/// Eavio - bulk import/export of EAV catalog objects.
#[derive(Parser)]
#[command(name = "eavio")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "EAVIO_CONFIG_PATH")]
    config: Option<PathBuf>,

    /// Log format (`pretty` or `json`).
    #[arg(long, global = true, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Import a file into the store.
    Import {
        /// Job file describing the import.
        #[arg(short, long)]
        job: PathBuf,
    },

    /// Export records to a file.
    Export {
        /// Job file describing the export.
        #[arg(short, long)]
        job: PathBuf,
    },

    /// List the importable fields of an object type.
    Fields {
        /// Object type identifier.
        #[arg(short, long)]
        object_type: i64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let format = match cli.log_format.parse::<LogFormat>() {
        Ok(format) => format,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        },
    };
    if let Err(e) =
        observability::init_logging(&LoggingConfig::from_env(cli.verbose).with_format(format))
    {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: EavioConfig) -> eavio::Result<()> {
    let runtime = Runtime::open(config)?;
    match command {
        Commands::Import { job } => cmd_import(&runtime, &job),
        Commands::Export { job } => cmd_export(&runtime, &job),
        Commands::Fields { object_type } => cmd_fields(&runtime, object_type),
    }
}

/// Loads configuration from the given file or the default location.
fn load_config(path: Option<&Path>) -> eavio::Result<EavioConfig> {
    path.map_or_else(
        || Ok(EavioConfig::load_default()),
        EavioConfig::load_from_file,
    )
}
