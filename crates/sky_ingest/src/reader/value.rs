use std::io::{self, Read};

use super::chunk::ChunkBuffer;
use super::RecordPosition;

#[derive(Debug)]
pub enum BoundedValue {
    Value {
        position: RecordPosition,
        bytes: Vec<u8>,
    },
    TooLarge {
        position: RecordPosition,
        observed_bytes: usize,
        max_bytes: usize,
    },
    Truncated {
        position: RecordPosition,
        observed_bytes: usize,
        /// Empty when the value had already outgrown the size limit.
        bytes: Vec<u8>,
    },
    IoError {
        position: RecordPosition,
        error: io::Error,
    },
}

/// Splits a byte stream into top-level JSON values without parsing them.
///
/// Boundaries come from bracket nesting, string/escape state, and (for bare
/// scalars at the top level) the next whitespace or structural byte. No
/// separator between values is required. Values are never validated here:
/// a malformed value still ends at its closing bracket so the next value
/// starts cleanly. Unbalanced brackets or quotes can only be caught after
/// decoding, so the caller hands such a value back through
/// [`ValueBoundaryReader::resume_after_first_line`].
pub struct ValueBoundaryReader<R: Read> {
    chunks: ChunkBuffer<R>,
    max_value_bytes: usize,
    replay: Vec<u8>,
    replay_pos: usize,
    current: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
    started: bool,
    depth: usize,
    in_string: bool,
    escaped: bool,
    in_scalar: bool,
    line: usize,
    record: usize,
    start_line: usize,
    eof: bool,
    done: bool,
}

enum Step {
    /// Byte consumed; keep scanning.
    Continue,
    /// Byte consumed and it closed the current value.
    CompleteAfter,
    /// Byte ends the current value but belongs to whatever follows.
    CompleteBefore,
}

impl<R: Read> ValueBoundaryReader<R> {
    pub fn new(reader: R, max_value_bytes: usize) -> Self {
        Self {
            chunks: ChunkBuffer::new(reader),
            max_value_bytes,
            replay: Vec::new(),
            replay_pos: 0,
            current: Vec::new(),
            observed_bytes: 0,
            discard_mode: false,
            started: false,
            depth: 0,
            in_string: false,
            escaped: false,
            in_scalar: false,
            line: 1,
            record: 0,
            start_line: 1,
            eof: false,
            done: false,
        }
    }

    /// Re-scans a value that failed to decode from the line after the one
    /// it started on, so one broken line cannot absorb the records after it.
    /// A value confined to a single line has nothing to re-scan.
    pub fn resume_after_first_line(&mut self, position: RecordPosition, bytes: &[u8]) {
        let Some(newline) = bytes.iter().position(|b| *b == b'\n') else {
            return;
        };
        let mut replay = bytes[newline + 1..].to_vec();
        replay.extend_from_slice(&self.replay[self.replay_pos..]);
        self.replay = replay;
        self.replay_pos = 0;
        self.line = position.line + 1;
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        if let Some(byte) = self.replay.get(self.replay_pos) {
            return Ok(Some(*byte));
        }
        if self.chunks.is_exhausted() {
            if self.eof {
                return Ok(None);
            }
            if self.chunks.fill()? == 0 {
                self.eof = true;
                return Ok(None);
            }
        }
        Ok(self.chunks.remaining().first().copied())
    }

    fn advance(&mut self) {
        if self.replay_pos < self.replay.len() {
            self.replay_pos += 1;
            if self.replay_pos == self.replay.len() {
                self.replay.clear();
                self.replay_pos = 0;
            }
        } else {
            self.chunks.consume(1);
        }
    }

    fn position(&self) -> RecordPosition {
        RecordPosition {
            record: self.record,
            line: self.start_line,
        }
    }

    fn push(&mut self, byte: u8) {
        self.observed_bytes = self.observed_bytes.saturating_add(1);
        if self.observed_bytes > self.max_value_bytes && !self.discard_mode {
            self.discard_mode = true;
            self.current.clear();
        }
        if !self.discard_mode {
            self.current.push(byte);
        }
    }

    fn begin(&mut self) {
        self.started = true;
        self.record += 1;
        self.start_line = self.line;
    }

    fn step(&mut self, byte: u8) -> Step {
        if !self.started {
            if byte.is_ascii_whitespace() {
                if byte == b'\n' {
                    self.line += 1;
                }
                return Step::Continue;
            }
            self.begin();
            self.push(byte);
            return match byte {
                b'{' | b'[' => {
                    self.depth = 1;
                    Step::Continue
                }
                b'"' => {
                    self.in_string = true;
                    Step::Continue
                }
                // stray closer at the top level
                b'}' | b']' => Step::CompleteAfter,
                _ => {
                    self.in_scalar = true;
                    Step::Continue
                }
            };
        }

        if self.in_string {
            self.push(byte);
            if byte == b'\n' {
                self.line += 1;
            }
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
                if self.depth == 0 {
                    return Step::CompleteAfter;
                }
            }
            return Step::Continue;
        }

        if self.in_scalar {
            if byte.is_ascii_whitespace() || matches!(byte, b'{' | b'[' | b'}' | b']' | b'"') {
                return Step::CompleteBefore;
            }
            self.push(byte);
            return Step::Continue;
        }

        self.push(byte);
        match byte {
            b'\n' => self.line += 1,
            b'"' => self.in_string = true,
            b'{' | b'[' => self.depth += 1,
            b'}' | b']' => {
                self.depth -= 1;
                if self.depth == 0 {
                    return Step::CompleteAfter;
                }
            }
            _ => {}
        }
        Step::Continue
    }

    fn finish_value(&mut self) -> BoundedValue {
        let position = Self::position(self);
        let outcome = if self.discard_mode {
            BoundedValue::TooLarge {
                position,
                observed_bytes: self.observed_bytes,
                max_bytes: self.max_value_bytes,
            }
        } else {
            BoundedValue::Value {
                position,
                bytes: std::mem::take(&mut self.current),
            }
        };
        self.reset_value_state();
        outcome
    }

    fn finish_at_eof(&mut self) -> Option<BoundedValue> {
        if !self.started {
            return None;
        }
        if self.in_scalar {
            return Some(self.finish_value());
        }
        let truncated = BoundedValue::Truncated {
            position: Self::position(self),
            observed_bytes: self.observed_bytes,
            bytes: std::mem::take(&mut self.current),
        };
        self.reset_value_state();
        Some(truncated)
    }

    fn reset_value_state(&mut self) {
        self.current.clear();
        self.observed_bytes = 0;
        self.discard_mode = false;
        self.started = false;
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
        self.in_scalar = false;
    }
}

impl<R: Read> Iterator for ValueBoundaryReader<R> {
    type Item = BoundedValue;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let byte = match self.peek() {
                Ok(Some(byte)) => byte,
                Ok(None) => return self.finish_at_eof(),
                Err(error) => {
                    self.done = true;
                    if !self.started {
                        self.record += 1;
                        self.start_line = self.line;
                    }
                    let position = Self::position(self);
                    self.reset_value_state();
                    return Some(BoundedValue::IoError { position, error });
                }
            };

            match self.step(byte) {
                Step::Continue => self.advance(),
                Step::CompleteAfter => {
                    self.advance();
                    return Some(self.finish_value());
                }
                Step::CompleteBefore => return Some(self.finish_value()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(input: &str) -> Vec<BoundedValue> {
        ValueBoundaryReader::new(std::io::Cursor::new(input.as_bytes().to_vec()), 1024).collect()
    }

    fn text(value: &BoundedValue) -> &str {
        match value {
            BoundedValue::Value { bytes, .. } => std::str::from_utf8(bytes).unwrap(),
            other => panic!("expected value, got {other:?}"),
        }
    }

    #[test]
    fn splits_concatenated_values_without_separators() {
        let values = split(r#"{"a":1}{"b":[1,{"c":"}"}]}[2] 3 "x\"y" true"#);
        let texts: Vec<_> = values.iter().map(text).collect();
        assert_eq!(
            texts,
            vec![
                r#"{"a":1}"#,
                r#"{"b":[1,{"c":"}"}]}"#,
                "[2]",
                "3",
                r#""x\"y""#,
                "true"
            ]
        );
    }

    #[test]
    fn tracks_record_ordinals_and_start_lines() {
        let values = split("{\"a\":1}\n\n{\n  \"b\": 2\n}\n{\"c\":3}\n");
        let positions: Vec<_> = values
            .iter()
            .map(|v| match v {
                BoundedValue::Value { position, .. } => *position,
                other => panic!("expected value, got {other:?}"),
            })
            .collect();
        assert_eq!(
            positions,
            vec![
                RecordPosition { record: 1, line: 1 },
                RecordPosition { record: 2, line: 3 },
                RecordPosition { record: 3, line: 6 },
            ]
        );
    }

    #[test]
    fn oversized_value_is_discarded_and_next_boundary_found() {
        let big = format!("{{\"pad\":\"{}\"}}", "x".repeat(64));
        let input = format!("{big}\n{{\"ok\":true}}");
        let values: Vec<_> =
            ValueBoundaryReader::new(std::io::Cursor::new(input.into_bytes()), 16).collect();
        assert_eq!(values.len(), 2);
        assert!(matches!(
            values[0],
            BoundedValue::TooLarge { max_bytes: 16, .. }
        ));
        assert_eq!(text(&values[1]), r#"{"ok":true}"#);
    }

    #[test]
    fn unterminated_value_is_reported_as_truncated() {
        let values = split("{\"a\":1}\n{\"b\":");
        assert_eq!(values.len(), 2);
        assert!(matches!(
            values[1],
            BoundedValue::Truncated {
                position: RecordPosition { record: 2, line: 2 },
                ..
            }
        ));
    }

    #[test]
    fn resume_rescans_from_the_line_after_a_broken_value() {
        let input = "{\"a\":1,\n{\"b\":2}\n{\"c\":3}\n";
        let mut reader = ValueBoundaryReader::new(std::io::Cursor::new(input.as_bytes()), 1024);

        let Some(BoundedValue::Truncated { position, bytes, .. }) = reader.next() else {
            panic!("expected the unclosed value to run to end of input");
        };
        assert_eq!(position, RecordPosition { record: 1, line: 1 });
        reader.resume_after_first_line(position, &bytes);

        let rest: Vec<_> = reader.collect();
        assert_eq!(rest.len(), 2);
        assert_eq!(text(&rest[0]), r#"{"b":2}"#);
        assert!(matches!(
            rest[1],
            BoundedValue::Value {
                position: RecordPosition { record: 3, line: 3 },
                ..
            }
        ));
    }

    #[test]
    fn stray_closer_is_its_own_value() {
        let values = split("} {\"a\":1}");
        assert_eq!(text(&values[0]), "}");
        assert_eq!(text(&values[1]), r#"{"a":1}"#);
    }
}
