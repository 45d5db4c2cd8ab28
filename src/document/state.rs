//! Per-document session state and the session store.

use std::sync::Arc;

use dashmap::DashMap;
use lsp_types::{Range, Uri};
use parking_lot::Mutex;

use super::anchor::{AnchorId, AnchorTable};
use super::overlay::OverlayEngine;
use super::text::LineIndex;

/// One classified lexical span, tracked by anchored positions.
///
/// Tokens are created by the decoder and replaced, never edited in place;
/// their anchors are released when a delta removes them or the whole list
/// is invalidated.
#[derive(Debug, Clone)]
pub struct Token {
    pub start: AnchorId,
    pub end: AnchorId,
    pub category: String,
    pub modifiers: Vec<String>,
}

/// State for a single open document.
#[derive(Debug)]
pub struct DocumentSession {
    /// Line-indexed document text.
    pub text: LineIndex,
    pub(crate) anchors: AnchorTable,
    /// Styling surface for this document.
    pub overlays: OverlayEngine,
    /// Ordered token list; None while unknown.
    pub tokens: Option<Vec<Token>>,
    /// Result id of the last accepted full or delta response.
    pub result_id: Option<String>,
    /// Document version from the client.
    pub version: i32,
}

impl DocumentSession {
    pub fn new(source: String, version: i32) -> Self {
        Self {
            text: LineIndex::new(source),
            anchors: AnchorTable::new(),
            overlays: OverlayEngine::new(),
            tokens: None,
            result_id: None,
            version,
        }
    }

    /// Apply a document edit: update the text and shift anchors and
    /// overlays to their post-edit locations.
    ///
    /// Returns false (and changes nothing) if `range` does not resolve.
    pub fn apply_edit(&mut self, range: Range, new_text: &str, version: i32) -> bool {
        let Some(new_end) = self.text.replace_range(range, new_text) else {
            return false;
        };
        self.anchors.adjust_for_edit(range, new_end);
        self.overlays.adjust_for_edit(range, new_end);
        self.version = version;
        true
    }

    /// Resolve a token's current document range.
    pub fn token_range(&self, token: &Token) -> Option<Range> {
        let start = self.anchors.resolve(token.start)?;
        let end = self.anchors.resolve(token.end)?;
        Some(Range::new(start, end))
    }

    /// Replace the tracked token list wholesale, releasing the anchors of
    /// the previous list.
    pub fn replace_tokens(&mut self, tokens: Vec<Token>, result_id: Option<String>) {
        self.invalidate_tokens();
        self.tokens = Some(tokens);
        self.result_id = result_id;
    }

    /// Reset token state to `(unknown, none)`, releasing every tracked
    /// anchor. The next refresh has to fetch a full snapshot.
    pub fn invalidate_tokens(&mut self) {
        if let Some(tokens) = self.tokens.take() {
            for token in &tokens {
                self.release_token(token);
            }
        }
        self.result_id = None;
    }

    pub(crate) fn release_token(&mut self, token: &Token) {
        self.anchors.release(token.start);
        self.anchors.release(token.end);
    }

    /// Number of anchors not yet released.
    pub fn live_anchor_count(&self) -> usize {
        self.anchors.live_count()
    }
}

/// Thread-safe storage for open documents.
#[derive(Debug, Default)]
pub struct SessionStore {
    documents: DashMap<Uri, Arc<Mutex<DocumentSession>>>,
}

impl SessionStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
        }
    }

    /// Open a document, replacing any previous session for the same URI.
    pub fn open(&self, uri: Uri, source: String, version: i32) -> Arc<Mutex<DocumentSession>> {
        let session = Arc::new(Mutex::new(DocumentSession::new(source, version)));
        self.documents.insert(uri, Arc::clone(&session));
        session
    }

    /// Close a document, dropping its session.
    pub fn close(&self, uri: &Uri) {
        self.documents.remove(uri);
    }

    /// Get a document's session.
    pub fn get(&self, uri: &Uri) -> Option<Arc<Mutex<DocumentSession>>> {
        self.documents.get(uri).map(|entry| Arc::clone(&entry))
    }
}
