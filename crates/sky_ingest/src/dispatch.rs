use std::ops::AddAssign;

use tracing::{debug, warn};

use crate::decoder::DecodedRecord;
use crate::error::{DecodeError, RejectReason, Rejection, RejectionSink};
use crate::event::{EventId, EventTimestamp};
use crate::normalize::{NormalizedEvent, Normalizer};
use crate::reader::RecordPosition;
use crate::store::Table;

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Committed {
        position: RecordPosition,
        object_id: EventId,
        timestamp: EventTimestamp,
    },
    Rejected(Rejection),
}

/// Counts of record outcomes for one input (or a whole run, when added up).
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct IngestSummary {
    pub records: usize,
    pub committed: usize,
    pub decode_errors: usize,
    pub invalid: usize,
    pub commit_errors: usize,
    pub failed_sources: usize,
}

impl IngestSummary {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.records += 1;
        match outcome {
            RecordOutcome::Committed { .. } => self.committed += 1,
            RecordOutcome::Rejected(rejection) => match rejection.reason {
                RejectReason::Decode(_) => self.decode_errors += 1,
                RejectReason::Normalize(_) => self.invalid += 1,
                RejectReason::Commit(_) => self.commit_errors += 1,
            },
        }
    }

    pub fn rejected(&self) -> usize {
        self.decode_errors + self.invalid + self.commit_errors
    }
}

impl AddAssign for IngestSummary {
    fn add_assign(&mut self, other: Self) {
        self.records += other.records;
        self.committed += other.committed;
        self.decode_errors += other.decode_errors;
        self.invalid += other.invalid;
        self.commit_errors += other.commit_errors;
        self.failed_sources += other.failed_sources;
    }
}

/// Validates, normalizes and commits one record at a time.
///
/// Every failure ends in [`RecordOutcome::Rejected`]; nothing here returns an
/// error to the caller, so the ingestion loop always moves on.
pub struct Dispatcher<T: Table> {
    table: T,
    normalizer: Normalizer,
    rejection_sink: Option<Box<dyn RejectionSink>>,
}

impl<T: Table> Dispatcher<T> {
    pub fn new(
        table: T,
        normalizer: Normalizer,
        rejection_sink: Option<Box<dyn RejectionSink>>,
    ) -> Self {
        Self {
            table,
            normalizer,
            rejection_sink,
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }

    pub fn dispatch(&mut self, record: DecodedRecord) -> RecordOutcome {
        let DecodedRecord { position, outcome } = record;

        let value = match outcome {
            Ok(value) => value,
            Err(err) => return self.reject(position, err.into()),
        };

        let NormalizedEvent { object_id, event } = match self.normalizer.normalize(value) {
            Ok(normalized) => normalized,
            Err(err) => return self.reject(position, err.into()),
        };

        if let Err(err) = self.table.commit_merge(&object_id, &event) {
            return self.reject(position, err.into());
        }

        debug!(
            table = self.table.name(),
            record = position.record,
            line = position.line,
            object_id = %object_id,
            timestamp = %event.timestamp,
            "committed event"
        );
        RecordOutcome::Committed {
            position,
            object_id,
            timestamp: event.timestamp,
        }
    }

    fn reject(&mut self, position: RecordPosition, reason: RejectReason) -> RecordOutcome {
        match &reason {
            RejectReason::Decode(DecodeError::Io { .. }) => {
                warn!(record = position.record, line = position.line, "[{position}] {reason}")
            }
            RejectReason::Decode(_) => warn!(
                record = position.record,
                line = position.line,
                "[{position}] invalid record: {reason}"
            ),
            RejectReason::Normalize(_) | RejectReason::Commit(_) => warn!(
                table = self.table.name(),
                record = position.record,
                line = position.line,
                "[{position}] {reason}"
            ),
        }

        let rejection = Rejection { position, reason };
        if let Some(sink) = self.rejection_sink.as_mut() {
            sink.on_rejection(&rejection);
        }
        RecordOutcome::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use crate::error::{CommitError, NormalizeError};
    use crate::store::{EventStore, MemoryStore, TableResolution};

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<Rejection>>>);

    impl RejectionSink for Collect {
        fn on_rejection(&mut self, rejection: &Rejection) {
            self.0.lock().unwrap().push(rejection.clone());
        }
    }

    fn record(line: usize, value: serde_json::Value) -> DecodedRecord {
        DecodedRecord {
            position: RecordPosition::line(line),
            outcome: Ok(value),
        }
    }

    fn dispatcher(store: &MemoryStore, sink: &Collect) -> Dispatcher<impl Table> {
        let table = store
            .resolve_table("events", TableResolution::RequireExisting)
            .unwrap();
        Dispatcher::new(table, Normalizer::default(), Some(Box::new(sink.clone())))
    }

    #[test]
    fn commits_valid_records() {
        let store = MemoryStore::new().with_table("events");
        let sink = Collect::default();
        let mut dispatcher = dispatcher(&store, &sink);

        let outcome = dispatcher.dispatch(record(
            1,
            json!({"id": "u1", "timestamp": "2024-01-01T00:00:00Z", "action": "login"}),
        ));

        assert!(matches!(outcome, RecordOutcome::Committed { ref object_id, .. } if object_id.as_str() == "u1"));
        assert_eq!(store.commit_count(), 1);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn every_failure_kind_is_rejected_and_reported() {
        let store = MemoryStore::new().with_table("events");
        store.refuse_object("blocked");
        let sink = Collect::default();
        let mut dispatcher = dispatcher(&store, &sink);
        let mut summary = IngestSummary::default();

        let inputs = vec![
            DecodedRecord {
                position: RecordPosition::line(1),
                outcome: Err(DecodeError::Json {
                    message: "expected value".to_string(),
                }),
            },
            record(2, json!({"action": "click"})),
            record(3, json!({"id": "blocked"})),
            record(4, json!({"id": "ok"})),
        ];
        for input in inputs {
            let outcome = dispatcher.dispatch(input);
            summary.record(&outcome);
        }

        let rejections = sink.0.lock().unwrap().clone();
        let lines: Vec<_> = rejections.iter().map(|r| r.position.line).collect();
        assert_eq!(lines, vec![1, 2, 3]);
        assert_eq!(
            rejections[1].reason,
            RejectReason::Normalize(NormalizeError::MissingIdentifier)
        );
        assert!(matches!(
            rejections[2].reason,
            RejectReason::Commit(CommitError::Rejected { status: 500, .. })
        ));

        assert_eq!(
            summary,
            IngestSummary {
                records: 4,
                committed: 1,
                decode_errors: 1,
                invalid: 1,
                commit_errors: 1,
                failed_sources: 0,
            }
        );
        assert_eq!(summary.rejected(), 3);
    }
}
