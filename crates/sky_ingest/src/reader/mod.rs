mod chunk;
mod line;
mod value;

pub use line::{BoundedLine, BoundedLineReader};
pub use value::{BoundedValue, ValueBoundaryReader};

/// Where a record came from, for diagnostics.
///
/// `record` is the 1-based ordinal of the record in its source; `line` is
/// the 1-based line on which the record starts. In line mode the two are
/// always equal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct RecordPosition {
    pub record: usize,
    pub line: usize,
}

impl RecordPosition {
    pub fn line(line_number: usize) -> Self {
        Self {
            record: line_number,
            line: line_number,
        }
    }
}

impl std::fmt::Display for RecordPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{}", self.line)
    }
}
