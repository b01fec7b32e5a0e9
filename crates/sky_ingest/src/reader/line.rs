use std::io::{self, Read};

use super::chunk::ChunkBuffer;

#[derive(Debug)]
pub enum BoundedLine {
    Line {
        line_number: usize,
        bytes: Vec<u8>,
    },
    TooLong {
        line_number: usize,
        observed_bytes: usize,
        max_bytes: usize,
    },
    IoError {
        line_number: usize,
        error: io::Error,
    },
}

/// Newline-delimited reader that never buffers more than `max_line_bytes` of
/// a single line.
///
/// Oversized lines are dropped and reported once as [`BoundedLine::TooLong`].
/// A read error is reported as [`BoundedLine::IoError`] and discards the
/// partially read line; the reader stays usable so the caller decides whether
/// to keep reading. End of stream ends the iterator.
pub struct BoundedLineReader<R: Read> {
    chunks: ChunkBuffer<R>,
    max_line_bytes: usize,
    current_line: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
    line_number: usize,
    done: bool,
}

impl<R: Read> BoundedLineReader<R> {
    pub fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            chunks: ChunkBuffer::new(reader),
            max_line_bytes,
            current_line: Vec::new(),
            observed_bytes: 0,
            discard_mode: false,
            line_number: 0,
            done: false,
        }
    }

    fn next_line_number(&mut self) -> usize {
        self.line_number += 1;
        self.line_number
    }

    fn finish_line(&mut self) -> BoundedLine {
        let line_number = self.next_line_number();

        if self.discard_mode {
            let observed_bytes = self.observed_bytes;
            self.reset_line_state();
            return BoundedLine::TooLong {
                line_number,
                observed_bytes,
                max_bytes: self.max_line_bytes,
            };
        }

        let bytes = std::mem::take(&mut self.current_line);
        self.reset_line_state();
        BoundedLine::Line { line_number, bytes }
    }

    fn reset_line_state(&mut self) {
        self.current_line.clear();
        self.observed_bytes = 0;
        self.discard_mode = false;
    }

    fn observe_bytes(&mut self, additional: usize) {
        self.observed_bytes = self.observed_bytes.saturating_add(additional);
        if self.observed_bytes > self.max_line_bytes && !self.discard_mode {
            self.discard_mode = true;
            self.current_line.clear();
        }
    }
}

impl<R: Read> Iterator for BoundedLineReader<R> {
    type Item = BoundedLine;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if self.chunks.is_exhausted() {
                match self.chunks.fill() {
                    Ok(0) => {
                        self.done = true;
                        if self.discard_mode || !self.current_line.is_empty() {
                            return Some(self.finish_line());
                        }
                        return None;
                    }
                    Ok(_) => {}
                    Err(error) => {
                        self.reset_line_state();
                        let line_number = self.next_line_number();
                        return Some(BoundedLine::IoError { line_number, error });
                    }
                }
            }

            let (newline_idx, slice_len) = {
                let slice = self.chunks.remaining();
                (slice.iter().position(|b| *b == b'\n'), slice.len())
            };

            let Some(newline_idx) = newline_idx else {
                self.observe_bytes(slice_len);
                if !self.discard_mode {
                    self.current_line.extend_from_slice(self.chunks.remaining());
                }
                self.chunks.consume(slice_len);
                continue;
            };

            self.observe_bytes(newline_idx);
            if !self.discard_mode {
                self.current_line
                    .extend_from_slice(&self.chunks.remaining()[..newline_idx]);
            }
            self.chunks.consume(newline_idx + 1);
            return Some(self.finish_line());
        }
    }
}
