use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{IngestConfig, IngestLimits, ReadErrorPolicy};
use crate::decoder::{LineDecoder, StreamDecoder};
use crate::dispatch::{Dispatcher, IngestSummary};
use crate::error::SourceError;
use crate::normalize::Normalizer;
use crate::source::Source;
use crate::store::Table;

/// Asks a running line-mode ingestion to stop before its next record.
///
/// A hook for embedders: the `sky-importer` binary never raises it and
/// relies on end of input or process termination instead. The flag is
/// checked between records, so a read already blocked on the input finishes
/// (and its record is dispatched) before the loop stops.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a line-mode ingestion loop ended.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LineStop {
    EndOfInput,
    StopRequested,
    ReadErrors { consecutive: u32 },
}

/// Drives sources through decoding and dispatch against one table.
pub struct Importer<T: Table> {
    dispatcher: Dispatcher<T>,
    limits: IngestLimits,
    read_errors: ReadErrorPolicy,
}

impl<T: Table> Importer<T> {
    pub fn new(table: T, config: IngestConfig) -> Self {
        let IngestConfig {
            limits,
            missing_timestamp,
            read_errors,
            rejection_sink,
        } = config;
        Self {
            dispatcher: Dispatcher::new(table, Normalizer::new(missing_timestamp), rejection_sink),
            limits,
            read_errors,
        }
    }

    pub fn table(&self) -> &T {
        self.dispatcher.table()
    }

    /// Imports every file in order. A file that cannot be opened is logged
    /// and skipped; it never stops the batch.
    pub fn import_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> IngestSummary {
        let mut total = IngestSummary::default();
        for path in paths {
            match self.import_file(path.as_ref()) {
                Ok(summary) => total += summary,
                Err(err) => {
                    warn!("invalid file: {err}");
                    total.failed_sources += 1;
                }
            }
        }
        info!(
            files = paths.len(),
            failed_files = total.failed_sources,
            records = total.records,
            committed = total.committed,
            rejected = total.rejected(),
            "import finished"
        );
        total
    }

    pub fn import_file(&mut self, path: &Path) -> Result<IngestSummary, SourceError> {
        let source = Source::open(path)?;
        info!(path = %path.display(), kind = %source.kind(), "importing file");
        let summary = self.import_stream(source);
        info!(
            path = %path.display(),
            records = summary.records,
            committed = summary.committed,
            rejected = summary.rejected(),
            "finished file"
        );
        Ok(summary)
    }

    /// Streaming mode over any reader; runs to end of stream.
    pub fn import_stream<R: Read>(&mut self, reader: R) -> IngestSummary {
        let mut summary = IngestSummary::default();
        for record in StreamDecoder::new(reader, self.limits.max_record_bytes) {
            let outcome = self.dispatcher.dispatch(record);
            summary.record(&outcome);
        }
        summary
    }

    pub fn import_stdin(&mut self, stop: &StopSignal) -> (IngestSummary, LineStop) {
        info!("waiting for stdin...");
        let (summary, reason) = self.import_lines(Source::stdin(), stop);
        info!(
            records = summary.records,
            committed = summary.committed,
            rejected = summary.rejected(),
            reason = ?reason,
            "stdin import finished"
        );
        (summary, reason)
    }

    /// Line mode: one record per line until end of input, a stop request,
    /// or the read-error policy gives up.
    pub fn import_lines<R: Read>(
        &mut self,
        reader: R,
        stop: &StopSignal,
    ) -> (IngestSummary, LineStop) {
        let mut decoder = LineDecoder::new(reader, self.limits.max_record_bytes);
        let mut summary = IngestSummary::default();
        let mut consecutive_errors = 0u32;

        loop {
            if stop.is_stop_requested() {
                debug!("stop requested");
                return (summary, LineStop::StopRequested);
            }
            let Some(record) = decoder.next() else {
                debug!("end of input");
                return (summary, LineStop::EndOfInput);
            };

            let read_failed = record.is_read_error();
            let outcome = self.dispatcher.dispatch(record);
            summary.record(&outcome);

            if !read_failed {
                consecutive_errors = 0;
                continue;
            }
            consecutive_errors += 1;
            if !self.read_errors.allows_retry(consecutive_errors) {
                warn!(
                    consecutive_errors,
                    max_retries = self.read_errors.max_retries,
                    "giving up on input after repeated read errors"
                );
                return (
                    summary,
                    LineStop::ReadErrors {
                        consecutive: consecutive_errors,
                    },
                );
            }
            if !self.read_errors.backoff.is_zero() {
                std::thread::sleep(self.read_errors.backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    use crate::store::{EventStore, MemoryStore, MemoryTable, TableResolution};

    /// Serves its lines, then fails every read.
    struct BrokenPipe {
        data: io::Cursor<Vec<u8>>,
    }

    impl Read for BrokenPipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.data.read(buf)?;
            if n > 0 {
                return Ok(n);
            }
            Err(io::Error::other("broken pipe"))
        }
    }

    /// Serves one line per read and raises `stop` on the given read.
    struct StopAfterRead {
        lines: Vec<&'static [u8]>,
        reads: usize,
        stop_on_read: usize,
        stop: StopSignal,
    }

    impl Read for StopAfterRead {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.reads += 1;
            if self.reads == self.stop_on_read {
                self.stop.request_stop();
            }
            if self.lines.is_empty() {
                return Ok(0);
            }
            let line = self.lines.remove(0);
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    fn importer(store: &MemoryStore, read_errors: ReadErrorPolicy) -> Importer<MemoryTable> {
        let table = store
            .resolve_table("events", TableResolution::RequireExisting)
            .unwrap();
        let config = IngestConfig {
            read_errors,
            ..IngestConfig::default()
        };
        Importer::new(table, config)
    }

    #[test]
    fn line_mode_ends_at_end_of_input() {
        let store = MemoryStore::new().with_table("events");
        let mut importer = importer(&store, ReadErrorPolicy::default());
        let input = b"{\"id\":\"a\"}\n{\"id\":\"b\"}\n".to_vec();

        let (summary, reason) = importer.import_lines(io::Cursor::new(input), &StopSignal::new());

        assert_eq!(reason, LineStop::EndOfInput);
        assert_eq!(summary.committed, 2);
        assert_eq!(store.event_count("events"), 2);
    }

    #[test]
    fn line_mode_gives_up_after_retry_budget() {
        let store = MemoryStore::new().with_table("events");
        let policy = ReadErrorPolicy {
            max_retries: 2,
            backoff: Duration::ZERO,
        };
        let mut importer = importer(&store, policy);
        let reader = BrokenPipe {
            data: io::Cursor::new(b"{\"id\":\"a\"}\n".to_vec()),
        };

        let (summary, reason) = importer.import_lines(reader, &StopSignal::new());

        assert_eq!(reason, LineStop::ReadErrors { consecutive: 3 });
        assert_eq!(summary.committed, 1);
        assert_eq!(summary.decode_errors, 3);
    }

    #[test]
    fn stop_request_ends_line_mode_before_next_record() {
        let store = MemoryStore::new().with_table("events");
        let mut importer = importer(&store, ReadErrorPolicy::default());
        let stop = StopSignal::new();
        stop.request_stop();

        let (summary, reason) =
            importer.import_lines(io::Cursor::new(b"{\"id\":\"a\"}\n".to_vec()), &stop);

        assert_eq!(reason, LineStop::StopRequested);
        assert_eq!(summary.records, 0);
        assert_eq!(store.commit_count(), 0);
    }

    #[test]
    fn stop_raised_mid_stream_lets_the_in_flight_record_finish() {
        let store = MemoryStore::new().with_table("events");
        let mut importer = importer(&store, ReadErrorPolicy::default());
        let stop = StopSignal::new();
        let reader = StopAfterRead {
            lines: vec![
                &b"{\"id\":\"a\"}\n"[..],
                &b"{\"id\":\"b\"}\n"[..],
                &b"{\"id\":\"c\"}\n"[..],
            ],
            reads: 0,
            stop_on_read: 2,
            stop: stop.clone(),
        };

        let (summary, reason) = importer.import_lines(reader, &stop);

        assert_eq!(reason, LineStop::StopRequested);
        assert_eq!(summary.committed, 2);
        assert!(store.events("events", "c").is_empty());
    }
}
