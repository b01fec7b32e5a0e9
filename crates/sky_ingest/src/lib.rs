#![forbid(unsafe_code)]
//! Streaming JSON ingestion into Sky event tables.
//!
//! Records flow one at a time through:
//! - a [`Source`] (plain file, `.gz` file, or stdin),
//! - a decoder ([`StreamDecoder`] for files, [`LineDecoder`] for stdin),
//! - the [`Dispatcher`], which normalizes each JSON object into an [`Event`]
//!   and merges it into a [`Table`].
//!
//! A bad record is logged and skipped; it never ends the stream.

mod config;
mod decoder;
mod dispatch;
mod error;
mod event;
mod normalize;
mod pipeline;
mod reader;
mod source;

pub mod store;

pub use config::{
    ConnectionConfig, IngestConfig, IngestLimits, MissingTimestamp, ReadErrorPolicy,
    DEFAULT_HOST, DEFAULT_PORT,
};
pub use decoder::{DecodedRecord, LineDecoder, StreamDecoder};
pub use dispatch::{Dispatcher, IngestSummary, RecordOutcome};
pub use error::{
    CommitError, DecodeError, NormalizeError, RejectReason, Rejection, RejectionSink,
    SourceError, StoreError,
};
pub use event::{Event, EventId, EventTimestamp, RawRecord};
pub use normalize::{NormalizedEvent, Normalizer, ID_KEY, TIMESTAMP_KEY};
pub use pipeline::{Importer, LineStop, StopSignal};
pub use reader::RecordPosition;
pub use source::{Source, SourceKind};
pub use store::{EventStore, Table, TableResolution};
