//! Anchored document positions.
//!
//! An anchor is a handle to a logical document position that stays correct
//! while the document is edited around it. Anchors are allocated when
//! tokens are decoded and must be released exactly once, when the owning
//! token is removed or superseded.

use lsp_types::{Position, Range};

use super::text::pos_key;

/// Handle to a tracked position in one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(u32);

/// Slab of live anchor positions for one document.
#[derive(Debug, Default)]
pub(crate) struct AnchorTable {
    slots: Vec<Option<Position>>,
    free: Vec<u32>,
}

impl AnchorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an anchor at `position`.
    pub fn create(&mut self, position: Position) -> AnchorId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(position);
                AnchorId(index)
            }
            None => {
                self.slots.push(Some(position));
                AnchorId(self.slots.len() as u32 - 1)
            }
        }
    }

    /// Current position of `id`, or None once released.
    pub fn resolve(&self, id: AnchorId) -> Option<Position> {
        self.slots.get(id.0 as usize).copied().flatten()
    }

    /// Release an anchor. Returns false if it was already released, so
    /// owners can detect a double release instead of corrupting the slab.
    pub fn release(&mut self, id: AnchorId) -> bool {
        match self.slots.get_mut(id.0 as usize) {
            Some(slot @ Some(_)) => {
                *slot = None;
                self.free.push(id.0);
                true
            }
            _ => false,
        }
    }

    /// Number of anchors not yet released.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Shift every live anchor for an edit that replaced `replaced` with
    /// text ending at `new_end`.
    pub fn adjust_for_edit(&mut self, replaced: Range, new_end: Position) {
        for slot in self.slots.iter_mut() {
            if let Some(position) = slot {
                *position = shift_position(*position, replaced, new_end);
            }
        }
    }
}

/// Map a pre-edit position to its post-edit location.
///
/// Positions before the replaced range are untouched, positions inside it
/// collapse to its start, and positions after it shift by the edit's
/// line/column delta.
pub(crate) fn shift_position(position: Position, replaced: Range, new_end: Position) -> Position {
    if pos_key(position) < pos_key(replaced.start) {
        return position;
    }
    if pos_key(position) < pos_key(replaced.end) {
        return replaced.start;
    }
    if position.line == replaced.end.line {
        Position::new(
            new_end.line,
            new_end.character + (position.character - replaced.end.character),
        )
    } else {
        // Strictly below the edit; only the line count changed.
        Position::new(
            position.line - replaced.end.line + new_end.line,
            position.character,
        )
    }
}
