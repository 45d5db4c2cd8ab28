//! Per-document editor-side state.
//!
//! This module provides:
//! - `LineIndex` for text storage and UTF-16 position conversion
//! - `AnchorId` handles for edit-tracked document positions
//! - `OverlayEngine` for restorable style overlays
//! - `DocumentSession` and `SessionStore` for document lifecycle

mod anchor;
mod overlay;
mod state;
mod text;

pub use anchor::AnchorId;
pub use overlay::{OverlayEngine, StyleStack};
pub use state::{DocumentSession, SessionStore, Token};
pub use text::LineIndex;
