//! Offset to line number mapping.

use std::ops::Range;

/// Byte offsets where each line of a source begins, built once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            starts,
            len: source.len(),
        }
    }

    /// Number of lines. An empty source has one (empty) line, and a
    /// trailing newline starts one more.
    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// 1-based line containing `offset`. Offsets past the end map to the
    /// last line.
    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset)
    }

    /// 1-based line and column (in bytes) of `offset`.
    pub fn line_column(&self, offset: usize) -> (usize, usize) {
        let line = self.line_of(offset);
        (line, offset - self.starts[line - 1] + 1)
    }

    /// Byte range of `line` without its line break.
    pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
        let start = *self.starts.get(line.checked_sub(1)?)?;
        let end = self.starts.get(line).map_or(self.len, |next| next - 1);
        Some(start..end)
    }
}
