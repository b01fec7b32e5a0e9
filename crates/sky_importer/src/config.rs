use std::path::PathBuf;
use std::time::Duration;

use sky_ingest::{
    ConnectionConfig, IngestConfig, IngestLimits, MissingTimestamp, ReadErrorPolicy,
    TableResolution,
};

use crate::Cli;

/// Everything resolved from the command line, built once and passed down.
pub struct ImporterConfig {
    pub connection: ConnectionConfig,
    pub table: String,
    pub resolution: TableResolution,
    pub ingest: IngestConfig,
    pub files: Vec<PathBuf>,
}

impl From<Cli> for ImporterConfig {
    fn from(cli: Cli) -> Self {
        let resolution = if cli.overwrite {
            TableResolution::Recreate
        } else {
            TableResolution::RequireExisting
        };
        let missing_timestamp = if cli.require_timestamp {
            MissingTimestamp::Reject
        } else {
            MissingTimestamp::UnixEpoch
        };

        Self {
            connection: ConnectionConfig {
                host: cli.host,
                port: cli.port,
                request_timeout: cli.request_timeout.map(Duration::from_secs),
            },
            table: cli.table,
            resolution,
            ingest: IngestConfig {
                limits: IngestLimits {
                    max_record_bytes: cli.max_record_bytes,
                },
                missing_timestamp,
                read_errors: ReadErrorPolicy {
                    max_retries: cli.read_retries,
                    ..ReadErrorPolicy::default()
                },
                rejection_sink: None,
            },
            files: cli.files,
        }
    }
}
