//! Refresh orchestration: strategy selection and response application.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use lsp_types::{
    Range, SemanticTokens, SemanticTokensFullDeltaResult, SemanticTokensFullOptions,
    SemanticTokensOptions, SemanticTokensRangeResult, SemanticTokensResult,
    SemanticTokensServerCapabilities, ServerCapabilities, Uri,
};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::document::{DocumentSession, SessionStore, Token};
use crate::error::{HighlightError, ProviderError};
use crate::settings::HighlightConfig;

use super::decode::decode_tokens;
use super::delta::apply_token_edits;
use super::legend::Legend;
use super::style::resolve_styles;

/// Negotiated semantic token capability, as read from the server.
#[derive(Debug, Clone, Default)]
pub struct Capability {
    pub full: bool,
    pub full_delta: bool,
    pub range: bool,
    pub legend: Legend,
}

impl Capability {
    /// Read negotiated options into the capability flags and legend.
    pub fn from_options(options: &SemanticTokensOptions) -> Self {
        let (full, full_delta) = match &options.full {
            Some(SemanticTokensFullOptions::Bool(supported)) => (*supported, false),
            Some(SemanticTokensFullOptions::Delta { delta }) => (true, delta.unwrap_or(false)),
            None => (false, false),
        };
        Self {
            full,
            full_delta,
            range: matches!(options.range, Some(true)),
            legend: Legend::from(&options.legend),
        }
    }

    /// Extract the capability from a server's initialize result.
    pub fn from_server(capabilities: &ServerCapabilities) -> Option<Self> {
        match capabilities.semantic_tokens_provider.as_ref()? {
            SemanticTokensServerCapabilities::SemanticTokensOptions(options) => {
                Some(Self::from_options(options))
            }
            SemanticTokensServerCapabilities::SemanticTokensRegistrationOptions(registration) => {
                Some(Self::from_options(&registration.semantic_tokens_options))
            }
        }
    }
}

/// Issues semantic token requests. Implemented by the transport layer.
///
/// Requests are asynchronous and must not block the caller; the engine
/// applies whichever response arrives, whenever it arrives.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// `textDocument/semanticTokens/full`.
    async fn semantic_tokens_full(
        &self,
        uri: &Uri,
    ) -> Result<Option<SemanticTokensResult>, ProviderError>;

    /// `textDocument/semanticTokens/full/delta`.
    async fn semantic_tokens_delta(
        &self,
        uri: &Uri,
        previous_result_id: &str,
    ) -> Result<Option<SemanticTokensFullDeltaResult>, ProviderError>;

    /// `textDocument/semanticTokens/range`.
    async fn semantic_tokens_range(
        &self,
        uri: &Uri,
        range: Range,
    ) -> Result<Option<SemanticTokensRangeResult>, ProviderError>;
}

/// How a refresh was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Token list replaced from a full snapshot.
    Full,
    /// Token list patched from a delta response.
    Delta,
    /// A sub-range was re-highlighted without touching the tracked list.
    Range,
    /// The server returned no payload; nothing changed.
    Unchanged,
    /// The response no longer had an eligible target and was dropped.
    Discarded,
    /// The payload was rejected and the token state reset; the next
    /// refresh falls back to a full request.
    Invalidated,
}

/// Retrieval strategy for one refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Strategy {
    Delta { previous_result_id: String },
    Range(Range),
    Full,
}

/// Pick the strategy for one refresh from the negotiated capability and
/// the session's current state.
///
/// Delta needs the delta preference, the advertised capability and a
/// result id recorded by an earlier response; a range request needs the
/// requested range to be a strict sub-range of the document; otherwise a
/// full snapshot. With none applicable the feature cannot proceed.
pub(crate) fn select_strategy(
    capability: &Capability,
    config: &HighlightConfig,
    last_result_id: Option<&str>,
    sub_range: Option<Range>,
) -> Result<Strategy, HighlightError> {
    if config.prefer_delta && capability.full_delta {
        if let Some(result_id) = last_result_id {
            return Ok(Strategy::Delta {
                previous_result_id: result_id.to_string(),
            });
        }
    }
    if capability.range {
        if let Some(range) = sub_range {
            return Ok(Strategy::Range(range));
        }
    }
    if capability.full {
        return Ok(Strategy::Full);
    }
    Err(HighlightError::CapabilityUnsupported)
}

/// Drives semantic token refreshes for open documents.
///
/// There is no response sequence numbering: when overlapping refreshes are
/// in flight, a stale response that arrives after a newer one has been
/// applied is applied on top. Refreshes are best effort and eventually
/// consistent; the next edit or idle tick repairs any divergence.
pub struct Highlighter {
    provider: Arc<dyn TokenProvider>,
    store: Arc<SessionStore>,
    capability: Capability,
    config: HighlightConfig,
    enabled: AtomicBool,
}

impl Highlighter {
    pub fn new(
        provider: Arc<dyn TokenProvider>,
        store: Arc<SessionStore>,
        capability: Capability,
        config: HighlightConfig,
    ) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            provider,
            store,
            capability,
            config,
            enabled,
        }
    }

    pub fn capability(&self) -> &Capability {
        &self.capability
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    /// Toggle the feature. While disabled, refreshes and in-flight
    /// responses are discarded without touching any session.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Refresh semantic highlighting for `uri`.
    ///
    /// `range` bounds the region of interest; it matters when the server
    /// can only serve sub-range requests for part of the document. Safe to
    /// call again while an earlier refresh is still awaiting its response.
    pub async fn refresh(
        &self,
        uri: &Uri,
        range: Option<Range>,
    ) -> Result<RefreshOutcome, HighlightError> {
        if !self.is_enabled() {
            return Ok(RefreshOutcome::Discarded);
        }
        let Some(session) = self.store.get(uri) else {
            return Ok(RefreshOutcome::Discarded);
        };
        let (last_result_id, sub_range) = {
            let session = session.lock();
            let sub_range = range.filter(|r| session.text.is_strict_sub_range(r));
            (session.result_id.clone(), sub_range)
        };
        drop(session);

        let strategy = select_strategy(
            &self.capability,
            &self.config,
            last_result_id.as_deref(),
            sub_range,
        )?;
        match strategy {
            Strategy::Delta { previous_result_id } => {
                let response = self
                    .provider
                    .semantic_tokens_delta(uri, &previous_result_id)
                    .await?;
                self.apply_delta_response(uri, response)
            }
            Strategy::Range(range) => {
                let response = self.provider.semantic_tokens_range(uri, range).await?;
                self.apply_range_response(uri, range, response)
            }
            Strategy::Full => {
                let response = self.provider.semantic_tokens_full(uri).await?;
                self.apply_full_response(uri, response)
            }
        }
    }

    /// Re-fetch the session after an await. A closed document or a
    /// disabled feature drops the response without touching any state.
    fn eligible_session(&self, uri: &Uri) -> Option<Arc<Mutex<DocumentSession>>> {
        if !self.is_enabled() {
            return None;
        }
        let session = self.store.get(uri);
        if session.is_none() {
            debug!(
                uri = uri.as_str(),
                "dropping semantic token response for closed document"
            );
        }
        session
    }

    fn apply_full_response(
        &self,
        uri: &Uri,
        response: Option<SemanticTokensResult>,
    ) -> Result<RefreshOutcome, HighlightError> {
        let Some(session) = self.eligible_session(uri) else {
            return Ok(RefreshOutcome::Discarded);
        };
        let mut session = session.lock();
        match response {
            Some(SemanticTokensResult::Tokens(payload)) => {
                Ok(self.replace_from_full(&mut session, payload))
            }
            Some(SemanticTokensResult::Partial(_)) => {
                Ok(self.reject(&mut session, "partial semantic token result"))
            }
            None => Ok(RefreshOutcome::Unchanged),
        }
    }

    fn apply_delta_response(
        &self,
        uri: &Uri,
        response: Option<SemanticTokensFullDeltaResult>,
    ) -> Result<RefreshOutcome, HighlightError> {
        let Some(session) = self.eligible_session(uri) else {
            return Ok(RefreshOutcome::Discarded);
        };
        let mut session = session.lock();
        match response {
            Some(SemanticTokensFullDeltaResult::TokensDelta(delta)) => {
                match apply_token_edits(&mut session, &delta.edits, &self.capability.legend) {
                    Ok(outcome) => {
                        session.result_id = delta.result_id;
                        for range in &outcome.removed {
                            session.overlays.unhighlight(*range);
                        }
                        // Inserted tokens can land where older overlays
                        // still sit; clear those before repainting.
                        for token in &outcome.inserted {
                            if let Some(range) = session.token_range(token) {
                                session.overlays.unhighlight(range);
                            }
                        }
                        self.highlight_tokens(&mut session, &outcome.inserted);
                        Ok(RefreshOutcome::Delta)
                    }
                    Err(error) => {
                        // The patcher already rolled the session back.
                        warn!(%error, "semantic token delta rejected; token state reset");
                        Ok(RefreshOutcome::Invalidated)
                    }
                }
            }
            // Servers may answer a delta request with a full snapshot.
            Some(SemanticTokensFullDeltaResult::Tokens(payload)) => {
                Ok(self.replace_from_full(&mut session, payload))
            }
            Some(SemanticTokensFullDeltaResult::PartialTokensDelta { .. }) => {
                Ok(self.reject(&mut session, "partial semantic token delta"))
            }
            None => Ok(RefreshOutcome::Unchanged),
        }
    }

    fn apply_range_response(
        &self,
        uri: &Uri,
        range: Range,
        response: Option<SemanticTokensRangeResult>,
    ) -> Result<RefreshOutcome, HighlightError> {
        let Some(session) = self.eligible_session(uri) else {
            return Ok(RefreshOutcome::Discarded);
        };
        let mut session = session.lock();
        let payload = match response {
            Some(SemanticTokensRangeResult::Tokens(payload)) => payload,
            Some(SemanticTokensRangeResult::Partial(_)) => {
                return Ok(self.reject(&mut session, "partial semantic token range result"));
            }
            None => return Ok(RefreshOutcome::Unchanged),
        };

        // Sub-range results are ephemeral: they repaint the requested
        // range without clobbering the tracked full-document list.
        let decoded =
            match decode_tokens(&mut session, &payload.data, &self.capability.legend, None) {
                Ok(decoded) => decoded,
                Err(error) => return Ok(self.reject(&mut session, &error.to_string())),
            };
        session.overlays.unhighlight(range);
        self.highlight_tokens(&mut session, &decoded);
        for token in &decoded {
            session.release_token(token);
        }
        Ok(RefreshOutcome::Range)
    }

    /// Replace the tracked list from a full snapshot and repaint the
    /// whole document.
    fn replace_from_full(
        &self,
        session: &mut DocumentSession,
        payload: SemanticTokens,
    ) -> RefreshOutcome {
        let decoded =
            match decode_tokens(session, &payload.data, &self.capability.legend, None) {
                Ok(decoded) => decoded,
                Err(error) => return self.reject(session, &error.to_string()),
            };
        let tokens = decoded.clone();
        session.replace_tokens(decoded, payload.result_id);
        session.overlays.unhighlight(session.text.full_range());
        self.highlight_tokens(session, &tokens);
        RefreshOutcome::Full
    }

    fn highlight_tokens(&self, session: &mut DocumentSession, tokens: &[Token]) {
        for token in tokens {
            let Some(styles) = resolve_styles(&token.category, &token.modifiers, &self.config)
            else {
                continue;
            };
            let (Some(start), Some(end)) = (
                session.anchors.resolve(token.start),
                session.anchors.resolve(token.end),
            ) else {
                continue;
            };
            session
                .overlays
                .highlight(&session.text, Range::new(start, end), styles);
        }
    }

    /// Malformed-payload policy: reset this document's token state and
    /// retry with a full request on the next refresh.
    fn reject(&self, session: &mut DocumentSession, reason: &str) -> RefreshOutcome {
        warn!(reason, "semantic token payload rejected; token state reset");
        session.invalidate_tokens();
        RefreshOutcome::Invalidated
    }
}
