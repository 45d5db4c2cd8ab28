//! Protocol-facing layer for semantic tokens.
//!
//! This module provides:
//! - Decoding of the relative-encoded token stream
//! - Delta patching of the tracked token list
//! - Token category/modifier to style resolution
//! - Refresh orchestration over a `TokenProvider`

mod decode;
mod delta;
mod legend;
mod refresh;
mod style;

pub use decode::{decode_tokens, group_quintuples};
pub use delta::{apply_token_edits, DeltaOutcome};
pub use legend::{
    client_capabilities, supported_token_modifiers, supported_token_types, Legend,
};
pub use refresh::{Capability, Highlighter, RefreshOutcome, TokenProvider};
pub use style::resolve_styles;
