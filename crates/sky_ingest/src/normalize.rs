use serde_json::Value;

use crate::config::MissingTimestamp;
use crate::error::NormalizeError;
use crate::event::{Event, EventId, EventTimestamp};

pub const ID_KEY: &str = "id";
pub const TIMESTAMP_KEY: &str = "timestamp";

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub object_id: EventId,
    pub event: Event,
}

/// Turns a decoded JSON value into an event addressed by object id.
///
/// `id` is required and coerced to a string: strings are taken verbatim,
/// everything else uses its compact JSON text (`42`, `true`, `[1,2]`).
/// `timestamp` is optional and parsed as RFC 3339 when it is a string.
/// Both keys are removed; every other key is carried over untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    missing_timestamp: MissingTimestamp,
}

impl Normalizer {
    pub fn new(missing_timestamp: MissingTimestamp) -> Self {
        Self { missing_timestamp }
    }

    pub fn normalize(&self, value: Value) -> Result<NormalizedEvent, NormalizeError> {
        let Value::Object(mut data) = value else {
            return Err(NormalizeError::NullRecord);
        };

        let object_id = match data.remove(ID_KEY) {
            None | Some(Value::Null) => return Err(NormalizeError::MissingIdentifier),
            Some(raw) => {
                EventId::new(coerce_identifier(raw)).ok_or(NormalizeError::BlankIdentifier)?
            }
        };

        let timestamp = match data.remove(TIMESTAMP_KEY) {
            Some(Value::String(raw)) => EventTimestamp::parse_rfc3339(&raw).map_err(|err| {
                NormalizeError::InvalidTimestamp {
                    value: raw.clone(),
                    reason: err.to_string(),
                }
            })?,
            _ => match self.missing_timestamp {
                MissingTimestamp::UnixEpoch => EventTimestamp::UNIX_EPOCH,
                MissingTimestamp::Reject => return Err(NormalizeError::MissingTimestamp),
            },
        };

        Ok(NormalizedEvent {
            object_id,
            event: Event::new(timestamp, data),
        })
    }
}

fn coerce_identifier(raw: Value) -> String {
    match raw {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
