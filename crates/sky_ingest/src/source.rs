use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::SourceError;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SourceKind {
    Plain,
    Gzip,
    Stdin,
}

impl SourceKind {
    /// `.gz` files are decompressed; everything else is read as-is.
    pub fn for_path(path: &Path) -> Self {
        let is_gzip = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
        if is_gzip {
            Self::Gzip
        } else {
            Self::Plain
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Gzip => "gzip",
            Self::Stdin => "stdin",
        })
    }
}

/// A forward-only byte stream over a file, a gzip file, or standard input.
///
/// The underlying handle is owned here and closed when the `Source` drops.
pub struct Source {
    kind: SourceKind,
    reader: Box<dyn BufRead>,
}

impl Source {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        match SourceKind::for_path(path) {
            SourceKind::Gzip => {
                let mut reader = BufReader::new(MultiGzDecoder::new(BufReader::new(file)));
                // The gzip header is parsed on first read; surface a bad one here.
                reader
                    .fill_buf()
                    .map_err(|source| SourceError::Decompress {
                        path: path.to_path_buf(),
                        source,
                    })?;
                Ok(Self::from_reader(SourceKind::Gzip, reader))
            }
            kind => Ok(Self::from_reader(kind, BufReader::new(file))),
        }
    }

    pub fn stdin() -> Self {
        Self::from_reader(SourceKind::Stdin, io::stdin().lock())
    }

    pub fn from_reader(kind: SourceKind, reader: impl BufRead + 'static) -> Self {
        Self {
            kind,
            reader: Box::new(reader),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

impl Read for Source {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl BufRead for Source {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.reader.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.reader.consume(amt)
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source").field("kind", &self.kind).finish()
    }
}
