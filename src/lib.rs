//! Client-side semantic token highlighting engine.
//!
//! Decodes the LSP `textDocument/semanticTokens` response family, keeps an
//! ordered token list per open document consistent across full and delta
//! refreshes, and overlays styling over document ranges while saving the
//! previously rendered styling per character so it can be restored
//! exactly.
//!
//! The transport, the capability handshake and the editor lifecycle are
//! collaborators: the host implements [`TokenProvider`], feeds the
//! negotiated server options into [`Capability`], opens documents in a
//! [`SessionStore`], and calls [`Highlighter::refresh`] when a document
//! changes or goes idle. Document edits are reported through
//! [`DocumentSession::apply_edit`], which keeps token anchors and overlays
//! aligned while responses are in flight.

mod document;
mod error;
mod lsp;
pub(crate) mod settings;

pub use document::{
    AnchorId, DocumentSession, LineIndex, OverlayEngine, SessionStore, StyleStack, Token,
};
pub use error::{HighlightError, ProviderError};
pub use lsp::{
    apply_token_edits, client_capabilities, decode_tokens, group_quintuples, resolve_styles,
    supported_token_modifiers, supported_token_types, Capability, DeltaOutcome, Highlighter,
    Legend, RefreshOutcome, TokenProvider,
};
pub use settings::{
    discover_settings, load_settings, HighlightConfig, HighlightSettings, ModifierSetting,
    ModifierStyle, Settings,
};
