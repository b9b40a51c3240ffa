//! Source mapping for compilation units
//!
//! Tracks the text of every compilation unit and converts the byte offsets
//! carried by AST nodes into line/column positions for diagnostics.

use std::collections::HashMap;
use std::fmt;

/// A resolved position in a source file (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self {
            line,
            column,
            byte_offset,
        }
    }

    /// Position used for nodes that carry no real source location
    pub fn unknown(byte_offset: usize) -> Self {
        Self::new(0, 0, byte_offset)
    }

    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_known() {
            write!(f, "{}:{}", self.line, self.column)
        } else {
            write!(f, "@{}", self.byte_offset)
        }
    }
}

/// A resolved range in one source file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpan {
    pub start: SourcePosition,
    pub end: SourcePosition,
    pub file_id: FileId,
}

impl SourceSpan {
    pub fn new(start: SourcePosition, end: SourcePosition, file_id: FileId) -> Self {
        Self {
            start,
            end,
            file_id,
        }
    }

    pub fn point(pos: SourcePosition, file_id: FileId) -> Self {
        let end = SourcePosition::new(pos.line, pos.column + 1, pos.byte_offset + 1);
        Self::new(pos, end, file_id)
    }

    /// Smallest span covering both; both spans must come from the same file.
    pub fn merge(self, other: SourceSpan) -> SourceSpan {
        debug_assert_eq!(self.file_id, other.file_id);
        let start = if self.start.byte_offset <= other.start.byte_offset {
            self.start
        } else {
            other.start
        };
        let end = if self.end.byte_offset >= other.end.byte_offset {
            self.end
        } else {
            other.end
        };
        SourceSpan::new(start, end, self.file_id)
    }
}

/// Identifier of a compilation unit's text inside a [`SourceMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(usize);

impl FileId {
    pub fn new(id: usize) -> Self {
        Self(id)
    }

    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Text of one compilation unit with a precomputed line table
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let line_starts = line_starts(&content);
        Self {
            name: name.into(),
            content,
            line_starts,
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Text of a 1-based line without its terminator
    pub fn line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 || line_number > self.line_starts.len() {
            return None;
        }
        let start = self.line_starts[line_number - 1];
        let end = self
            .line_starts
            .get(line_number)
            .copied()
            .unwrap_or(self.content.len());
        Some(self.content[start..end].trim_end_matches(['\n', '\r']))
    }

    /// 1-based line and column of a byte offset. Offsets past the end clamp
    /// to the last line.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.content.len());
        let index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let line_start = self.line_starts[index];
        (index + 1, offset - line_start + 1)
    }

    pub fn position(&self, offset: usize) -> SourcePosition {
        let (line, column) = self.line_col(offset);
        SourcePosition::new(line, column, offset)
    }

    pub fn slice(&self, start: usize, end: usize) -> Option<&str> {
        self.content.get(start..end)
    }
}

/// All compilation units known to a pipeline run
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: HashMap<FileId, SourceFile>,
    next_id: usize,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<String>) -> FileId {
        let id = FileId(self.next_id);
        self.next_id += 1;
        self.files.insert(id, SourceFile::new(name, content));
        id
    }

    pub fn get_file(&self, file_id: FileId) -> Option<&SourceFile> {
        self.files.get(&file_id)
    }

    pub fn get_line(&self, file_id: FileId, line_number: usize) -> Option<&str> {
        self.get_file(file_id)?.line(line_number)
    }

    pub fn position(&self, file_id: FileId, offset: usize) -> Option<SourcePosition> {
        self.get_file(file_id).map(|file| file.position(offset))
    }

    /// Resolve a byte range of a file into a [`SourceSpan`].
    pub fn span(&self, file_id: FileId, start: usize, end: usize) -> Option<SourceSpan> {
        let file = self.get_file(file_id)?;
        Some(SourceSpan::new(
            file.position(start),
            file.position(end.max(start)),
            file_id,
        ))
    }

    /// Like [`SourceMap::span`] but never fails: unknown files yield a span
    /// with unknown positions that still carries the offsets.
    pub fn span_or_unknown(&self, file_id: FileId, start: usize, end: usize) -> SourceSpan {
        self.span(file_id, start, end).unwrap_or_else(|| {
            SourceSpan::new(
                SourcePosition::unknown(start),
                SourcePosition::unknown(end),
                file_id,
            )
        })
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.files.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn line_starts(source: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(
        source
            .char_indices()
            .filter(|(_, ch)| *ch == '\n')
            .map(|(i, _)| i + 1),
    );
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines() {
        let file = SourceFile::new("unit.ets", "let a: int = 1;\na += 2;\n");
        assert_eq!(file.line(1), Some("let a: int = 1;"));
        assert_eq!(file.line(2), Some("a += 2;"));
        assert_eq!(file.line(3), Some(""));
        assert_eq!(file.line(4), None);
    }

    #[test]
    fn test_line_col() {
        let file = SourceFile::new("unit.ets", "abc\ndef\nghi");
        assert_eq!(file.line_col(0), (1, 1));
        assert_eq!(file.line_col(2), (1, 3));
        assert_eq!(file.line_col(4), (2, 1));
        assert_eq!(file.line_col(10), (3, 3));
        assert_eq!(file.line_col(999), (3, 4));
    }

    #[test]
    fn test_span_merge() {
        let mut map = SourceMap::new();
        let id = map.add_file("unit.ets", "a += 2;");
        let left = map.span(id, 0, 1).unwrap();
        let right = map.span(id, 5, 6).unwrap();
        let merged = left.merge(right);
        assert_eq!(merged.start.byte_offset, 0);
        assert_eq!(merged.end.byte_offset, 6);
    }

    #[test]
    fn test_unknown_file_span() {
        let map = SourceMap::new();
        let span = map.span_or_unknown(FileId::new(7), 3, 9);
        assert!(!span.start.is_known());
        assert_eq!(span.end.byte_offset, 9);
    }
}
