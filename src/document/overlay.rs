//! Style overlay engine.
//!
//! Applies visual styles over character ranges while saving whatever was
//! rendered before, so unhighlighting restores the prior styling exactly,
//! including "no style", and even when ranges only partially overlap.
//!
//! The model is per character cell, a cell being one UTF-16 code unit
//! addressed by `(line, column)`. Coalescing equal-styled runs would be a
//! rendering optimization; it is not needed for correctness and is not
//! done here.

use std::collections::BTreeMap;

use lsp_types::{Position, Range};

use super::anchor::shift_position;
use super::text::{pos_key, LineIndex};

/// Styles rendered on one character cell, base style first; later entries
/// win when they conflict.
pub type StyleStack = Vec<String>;

type Cell = (u32, u32);

/// Restorable styling surface for one document.
#[derive(Debug, Default)]
pub struct OverlayEngine {
    /// Currently rendered styling per cell; absent means unstyled.
    surface: BTreeMap<Cell, StyleStack>,
    /// Overlay markers: per cell, the styling present before each still
    /// active highlight, most recent last.
    marks: BTreeMap<Cell, Vec<Option<StyleStack>>>,
}

impl OverlayEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set styling without marking it as an overlay.
    ///
    /// This models styling owned by other sources (a syntax layer, search
    /// matches) that highlight/unhighlight must preserve. An empty stack
    /// clears the cells.
    pub fn paint(&mut self, text: &LineIndex, range: Range, styles: StyleStack) {
        for cell in cells_in_range(text, range) {
            if styles.is_empty() {
                self.surface.remove(&cell);
            } else {
                self.surface.insert(cell, styles.clone());
            }
        }
    }

    /// Apply `styles` over `range`, saving the current styling of every
    /// character so [`unhighlight`](Self::unhighlight) can restore it.
    pub fn highlight(&mut self, text: &LineIndex, range: Range, styles: StyleStack) {
        for cell in cells_in_range(text, range) {
            let saved = self.surface.get(&cell).cloned();
            self.marks.entry(cell).or_default().push(saved);
            self.surface.insert(cell, styles.clone());
        }
    }

    /// Remove overlays within `range`, restoring the saved styling.
    ///
    /// Only cells this engine marked are touched; for each, the most
    /// recent save record is popped, so overlapping highlights
    /// unhighlighted in reverse order unwind to the original styling.
    pub fn unhighlight(&mut self, range: Range) {
        let start = pos_key(range.start);
        let end = pos_key(range.end);
        if end <= start {
            return;
        }
        let marked: Vec<Cell> = self.marks.range(start..end).map(|(cell, _)| *cell).collect();

        for cell in marked {
            let Some(saves) = self.marks.get_mut(&cell) else {
                continue;
            };
            match saves.pop() {
                Some(Some(previous)) => {
                    self.surface.insert(cell, previous);
                }
                Some(None) => {
                    self.surface.remove(&cell);
                }
                None => {}
            }
            if saves.is_empty() {
                self.marks.remove(&cell);
            }
        }
    }

    /// Styling currently rendered at `position`.
    pub fn style_at(&self, position: Position) -> Option<&StyleStack> {
        self.surface.get(&pos_key(position))
    }

    /// Whether `position` currently carries an overlay marker.
    pub fn is_marked(&self, position: Position) -> bool {
        self.marks.contains_key(&pos_key(position))
    }

    /// Number of marked character cells.
    pub fn marked_cells(&self) -> usize {
        self.marks.len()
    }

    /// Shift all cells for an edit that replaced `replaced` with text
    /// ending at `new_end`, keeping stale overlays aligned until the next
    /// refresh repaints them.
    pub fn adjust_for_edit(&mut self, replaced: Range, new_end: Position) {
        self.surface = remap(std::mem::take(&mut self.surface), replaced, new_end);
        self.marks = remap(std::mem::take(&mut self.marks), replaced, new_end);
    }

    /// Drop all styling and markers.
    pub fn clear(&mut self) {
        self.surface.clear();
        self.marks.clear();
    }
}

fn remap<V>(map: BTreeMap<Cell, V>, replaced: Range, new_end: Position) -> BTreeMap<Cell, V> {
    map.into_iter()
        .map(|((line, character), value)| {
            let shifted = shift_position(Position::new(line, character), replaced, new_end);
            ((shifted.line, shifted.character), value)
        })
        .collect()
}

/// Enumerate the character cells of `range`, clamped to line lengths.
fn cells_in_range(text: &LineIndex, range: Range) -> Vec<Cell> {
    let mut cells = Vec::new();
    if pos_key(range.end) <= pos_key(range.start) {
        return cells;
    }
    let last_line = range.end.line.min(text.line_count().saturating_sub(1));
    for line in range.start.line..=last_line {
        let Some(len) = text.line_len_utf16(line) else {
            break;
        };
        let from = if line == range.start.line {
            range.start.character
        } else {
            0
        };
        let to = if line == range.end.line {
            range.end.character.min(len)
        } else {
            len
        };
        for character in from..to {
            cells.push((line, character));
        }
    }
    cells
}
