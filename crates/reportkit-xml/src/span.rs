//! Byte spans and their line/column projection.

use std::fmt;

/// A half-open byte range `[start, end)` into the parsed source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A 1-indexed line and column, computed from a [`Span`] start offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineColumn {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve the start of this span to a line and column in `source`.
    ///
    /// Columns count characters, not bytes. Offsets past the end of `source`
    /// clamp to the last position.
    pub fn line_column(&self, source: &str) -> LineColumn {
        let mut offset = self.start.min(source.len());
        while !source.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |pos| pos + 1);
        let column = before[line_start..].chars().count() + 1;
        LineColumn { line, column }
    }
}

impl fmt::Display for LineColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
