use std::io::Read;

use serde_json::Value;

use crate::error::DecodeError;
use crate::reader::{
    BoundedLine, BoundedLineReader, BoundedValue, RecordPosition, ValueBoundaryReader,
};

/// One decode attempt and where in the source it happened.
#[derive(Debug, Clone)]
pub struct DecodedRecord {
    pub position: RecordPosition,
    pub outcome: Result<Value, DecodeError>,
}

impl DecodedRecord {
    fn error(position: RecordPosition, err: DecodeError) -> Self {
        Self {
            position,
            outcome: Err(err),
        }
    }

    pub fn is_read_error(&self) -> bool {
        matches!(self.outcome, Err(DecodeError::Io { .. }))
    }
}

/// Line mode: one JSON value per line.
///
/// Blank lines are skipped but still counted. Read errors are yielded as
/// [`DecodeError::Io`] and the decoder keeps going; whether to keep calling
/// `next` after one is the caller's decision. End of stream ends iteration.
pub struct LineDecoder<R: Read> {
    reader: BoundedLineReader<R>,
}

impl<R: Read> LineDecoder<R> {
    pub fn new(reader: R, max_record_bytes: usize) -> Self {
        Self {
            reader: BoundedLineReader::new(reader, max_record_bytes),
        }
    }

    fn normalize_line(line: &str) -> &str {
        line.strip_suffix('\r').unwrap_or(line)
    }

    fn line_is_blank(line: &str) -> bool {
        line.chars().all(|ch| ch.is_whitespace())
    }
}

impl<R: Read> Iterator for LineDecoder<R> {
    type Item = DecodedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.reader.next()? {
                BoundedLine::IoError { line_number, error } => {
                    return Some(DecodedRecord::error(
                        RecordPosition::line(line_number),
                        DecodeError::Io {
                            message: error.to_string(),
                        },
                    ));
                }
                BoundedLine::TooLong {
                    line_number,
                    observed_bytes,
                    max_bytes,
                } => {
                    return Some(DecodedRecord::error(
                        RecordPosition::line(line_number),
                        DecodeError::TooLarge {
                            observed_bytes,
                            max_bytes,
                        },
                    ));
                }
                BoundedLine::Line { line_number, bytes } => {
                    let position = RecordPosition::line(line_number);
                    let Ok(raw_line) = String::from_utf8(bytes) else {
                        return Some(DecodedRecord::error(position, DecodeError::InvalidUtf8));
                    };
                    let line = Self::normalize_line(&raw_line);
                    if Self::line_is_blank(line) {
                        continue;
                    }
                    return Some(DecodedRecord {
                        position,
                        outcome: serde_json::from_str::<Value>(line).map_err(DecodeError::from),
                    });
                }
            }
        }
    }
}

/// Streaming mode: consecutive top-level JSON values, any whitespace (or
/// none) between them.
///
/// A malformed value is reported on its own and decoding resumes at the next
/// value boundary. When the bad value spans several lines (an unclosed
/// bracket or a stray quote), scanning restarts on the line after the one it
/// started on. A read error ends the stream.
pub struct StreamDecoder<R: Read> {
    reader: ValueBoundaryReader<R>,
}

impl<R: Read> StreamDecoder<R> {
    pub fn new(reader: R, max_record_bytes: usize) -> Self {
        Self {
            reader: ValueBoundaryReader::new(reader, max_record_bytes),
        }
    }
}

impl<R: Read> Iterator for StreamDecoder<R> {
    type Item = DecodedRecord;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.reader.next()? {
            BoundedValue::Value { position, bytes } => {
                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(value) => DecodedRecord {
                        position,
                        outcome: Ok(value),
                    },
                    Err(err) => {
                        self.reader.resume_after_first_line(position, &bytes);
                        DecodedRecord::error(position, err.into())
                    }
                }
            }
            BoundedValue::TooLarge {
                position,
                observed_bytes,
                max_bytes,
            } => DecodedRecord::error(
                position,
                DecodeError::TooLarge {
                    observed_bytes,
                    max_bytes,
                },
            ),
            BoundedValue::Truncated {
                position,
                observed_bytes,
                bytes,
            } => {
                self.reader.resume_after_first_line(position, &bytes);
                DecodedRecord::error(position, DecodeError::Truncated { observed_bytes })
            }
            BoundedValue::IoError { position, error } => DecodedRecord::error(
                position,
                DecodeError::Io {
                    message: error.to_string(),
                },
            ),
        };
        Some(record)
    }
}
