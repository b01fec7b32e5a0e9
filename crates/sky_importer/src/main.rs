mod config;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use sky_ingest::store::HttpStore;
use sky_ingest::{EventStore, Importer, StopSignal, Table, DEFAULT_HOST, DEFAULT_PORT};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::ImporterConfig;
use crate::error::StartupError;

#[derive(Debug, Parser)]
#[command(name = "sky-importer", version)]
#[command(about = "Import JSON events into a Sky table from files or stdin")]
pub struct Cli {
    /// The host the Sky server is running on.
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// The port the Sky server is running on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// The table to insert events into.
    #[arg(short, long)]
    pub table: String,

    /// Drop and recreate the table before importing.
    #[arg(long)]
    pub overwrite: bool,

    /// Reject records without a timestamp instead of stamping them at the UNIX epoch.
    #[arg(long)]
    pub require_timestamp: bool,

    /// Discard records larger than this many bytes.
    #[arg(long, default_value_t = 1024 * 1024)]
    pub max_record_bytes: usize,

    /// Consecutive stdin read errors tolerated before stopping.
    #[arg(long, default_value_t = 5)]
    pub read_retries: u32,

    /// Per-request HTTP timeout in seconds. Unset waits forever.
    #[arg(long)]
    pub request_timeout: Option<u64>,

    /// Verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Files to import (`.gz` files are decompressed). Reads stdin when none are given.
    pub files: Vec<PathBuf>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn connect(config: &ImporterConfig) -> Result<impl Table, StartupError> {
    let connection = &config.connection;
    info!(host = %connection.host, port = connection.port, "connecting");

    let store = HttpStore::new(connection);
    if !store.ping() {
        return Err(StartupError::ServerUnreachable {
            host: connection.host.clone(),
            port: connection.port,
        });
    }
    Ok(store.resolve_table(&config.table, config.resolution)?)
}

fn run(config: ImporterConfig) -> Result<(), StartupError> {
    let table = connect(&config)?;
    let ImporterConfig { ingest, files, .. } = config;
    let mut importer = Importer::new(table, ingest);

    if files.is_empty() {
        importer.import_stdin(&StopSignal::new());
    } else {
        importer.import_files(&files);
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(ImporterConfig::from(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
