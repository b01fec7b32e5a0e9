use sky_ingest::StoreError;
use thiserror::Error;

/// Failures that end the run before any record is read.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("server is not running at {host}:{port}")]
    ServerUnreachable { host: String, port: u16 },
    #[error(transparent)]
    Store(#[from] StoreError),
}
