//! Line-indexed document text with position conversion.
//!
//! LSP positions use line/column where column is in UTF-16 code units.
//! `LineIndex` pre-computes line start offsets for O(log n) lookup and
//! supports in-place range replacement so one instance can track a
//! document across edits.

use lsp_types::{Position, Range};

/// Order positions by line, then column.
pub(crate) fn pos_key(position: Position) -> (u32, u32) {
    (position.line, position.character)
}

/// Line-indexed source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    /// Source text (needed for UTF-16 column calculation).
    source: String,
}

impl LineIndex {
    /// Build a line index from source text.
    pub fn new(source: String) -> Self {
        let line_starts = compute_line_starts(&source);
        Self {
            line_starts,
            source,
        }
    }

    /// Get the source text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of lines; the empty document has one empty line.
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Length of a line in UTF-16 code units, excluding the terminator.
    pub fn line_len_utf16(&self, line: u32) -> Option<u32> {
        let line = line as usize;
        let start = *self.line_starts.get(line)?;
        let end = self
            .line_starts
            .get(line + 1)
            .map(|&next| next.saturating_sub(1)) // exclude newline
            .unwrap_or(self.source.len());
        let len = self.source[start..end]
            .chars()
            .map(|c| c.len_utf16() as u32)
            .sum();
        Some(len)
    }

    /// Position just past the last character of the document.
    pub fn end_position(&self) -> Position {
        let last = self.line_count().saturating_sub(1);
        Position::new(last, self.line_len_utf16(last).unwrap_or(0))
    }

    /// The full document as a range.
    pub fn full_range(&self) -> Range {
        Range::new(Position::new(0, 0), self.end_position())
    }

    /// Whether `range` lies within the document without covering it whole.
    pub fn is_strict_sub_range(&self, range: &Range) -> bool {
        let full = self.full_range();
        let inside = pos_key(range.start) >= pos_key(full.start)
            && pos_key(range.end) <= pos_key(full.end)
            && pos_key(range.start) <= pos_key(range.end);
        inside && !(range.start == full.start && range.end == full.end)
    }

    /// Convert a byte offset to an LSP position.
    ///
    /// Uses binary search for O(log n) line lookup, then scans the line for
    /// the UTF-16 column.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,                    // exact match (start of line)
            Err(line) => line.saturating_sub(1), // in the middle of a line
        };

        let line_start = self.line_starts[line];
        let line_end = self
            .line_starts
            .get(line + 1)
            .copied()
            .unwrap_or(self.source.len());

        let mut col = 0u32;
        let line_slice = &self.source[line_start..line_end];

        for (i, c) in line_slice.char_indices() {
            if line_start + i >= offset {
                break;
            }
            col += c.len_utf16() as u32;
        }

        Position::new(line as u32, col)
    }

    /// Convert an LSP position to a byte offset.
    ///
    /// Returns None if the line is out of bounds; a column past the end of
    /// its line clamps to the line end.
    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;

        if line >= self.line_starts.len() {
            return None;
        }

        let line_start = self.line_starts[line];
        let line_end = self
            .line_starts
            .get(line + 1)
            .map(|&end| end.saturating_sub(1)) // exclude newline
            .unwrap_or(self.source.len());

        let line_slice = &self.source[line_start..line_end];

        // Walk UTF-16 code units to find the byte offset.
        let mut utf16_col = 0u32;
        for (i, c) in line_slice.char_indices() {
            if utf16_col >= position.character {
                return Some(line_start + i);
            }
            utf16_col += c.len_utf16() as u32;
        }

        Some(line_end.min(self.source.len()))
    }

    /// Replace `range` with `text`, re-indexing the document.
    ///
    /// Returns the position just past the inserted text, or None if the
    /// range does not resolve.
    pub fn replace_range(&mut self, range: Range, text: &str) -> Option<Position> {
        let start = self.position_to_offset(range.start)?;
        let end = self.position_to_offset(range.end)?;
        if start > end {
            return None;
        }
        self.source.replace_range(start..end, text);
        self.line_starts = compute_line_starts(&self.source);
        Some(self.offset_to_position(start + text.len()))
    }
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut line_starts = vec![0];
    for (i, c) in source.char_indices() {
        if c == '\n' {
            line_starts.push(i + 1);
        }
    }
    line_starts
}
