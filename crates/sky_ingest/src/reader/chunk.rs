use std::io::{self, Read};

const CHUNK_SIZE_BYTES: usize = 8192;

/// Fixed-size read buffer under the line and value readers.
pub struct ChunkBuffer<R: Read> {
    reader: R,
    buffer: [u8; CHUNK_SIZE_BYTES],
    pos: usize,
    len: usize,
}

impl<R: Read> ChunkBuffer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: [0u8; CHUNK_SIZE_BYTES],
            pos: 0,
            len: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.len
    }

    /// Replaces the current chunk with the next read. `Ok(0)` is end of
    /// stream; interrupted reads are retried.
    pub fn fill(&mut self) -> io::Result<usize> {
        self.pos = 0;
        self.len = 0;
        loop {
            match self.reader.read(&mut self.buffer) {
                Ok(n) => {
                    self.len = n;
                    return Ok(n);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
    }

    pub fn remaining(&self) -> &[u8] {
        &self.buffer[self.pos..self.len]
    }

    pub fn consume(&mut self, amt: usize) {
        self.pos = (self.pos + amt).min(self.len);
    }
}
