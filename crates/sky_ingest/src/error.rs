use std::path::PathBuf;

use thiserror::Error;

use crate::reader::RecordPosition;

/// Failure to open an input. Fatal to that one input only.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid gzip stream in {path:?}: {source}")]
    Decompress {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A record that could not be turned into a JSON value.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error("read failed: {message}")]
    Io { message: String },
    #[error("invalid UTF-8 in input")]
    InvalidUtf8,
    #[error("record too large (observed_bytes={observed_bytes}, max_bytes={max_bytes})")]
    TooLarge {
        observed_bytes: usize,
        max_bytes: usize,
    },
    #[error("invalid JSON: {message}")]
    Json { message: String },
    #[error("input ended inside a JSON value after {observed_bytes} bytes")]
    Truncated { observed_bytes: usize },
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum NormalizeError {
    #[error("null object cannot be imported")]
    NullRecord,
    #[error("invalid ID")]
    MissingIdentifier,
    #[error("ID cannot be blank")]
    BlankIdentifier,
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
    #[error("timestamp is required")]
    MissingTimestamp,
}

/// The store refused or never received a commit.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CommitError {
    #[error("store rejected event (status={status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("failed to encode event: {0}")]
    Encode(String),
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum StoreError {
    #[error("unable to find table '{name}'")]
    TableNotFound { name: String },
    #[error("store returned status {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Why a record ended in the rejected state.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum RejectReason {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Commit(#[from] CommitError),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Rejection {
    pub position: RecordPosition,
    pub reason: RejectReason,
}

/// Receives every rejected record in addition to the `warn!` log line.
pub trait RejectionSink: Send + 'static {
    fn on_rejection(&mut self, rejection: &Rejection);
}
