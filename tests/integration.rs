use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use expect_test::expect;
use lsp_types::{
    Position, Range, SemanticTokenModifier, SemanticTokenType, SemanticTokens,
    SemanticTokensDelta, SemanticTokensEdit, SemanticTokensFullDeltaResult,
    SemanticTokensFullOptions, SemanticTokensLegend, SemanticTokensOptions,
    SemanticTokensRangeResult, SemanticTokensResult, Uri, WorkDoneProgressOptions,
};
use semtok::{
    group_quintuples, Capability, HighlightConfig, HighlightError, Highlighter, ModifierStyle,
    ProviderError, RefreshOutcome, SessionStore, TokenProvider,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const SOURCE: &str = "let counter = 1;\n  count(x);\n";

/// Two tokens: `counter`-ish keyword at 0:5..0:9, `count` at 1:2..1:7.
const FULL_DATA: &[u32] = &[0, 5, 4, 0, 0, 1, 2, 5, 1, 0];

fn uri() -> Uri {
    "file:///main.rs".parse().unwrap()
}

fn capability(delta: bool, range: bool) -> Capability {
    Capability::from_options(&SemanticTokensOptions {
        legend: SemanticTokensLegend {
            token_types: vec![
                SemanticTokenType::KEYWORD,
                SemanticTokenType::FUNCTION,
                SemanticTokenType::VARIABLE,
            ],
            token_modifiers: vec![
                SemanticTokenModifier::STATIC,
                SemanticTokenModifier::DEPRECATED,
            ],
        },
        full: Some(if delta {
            SemanticTokensFullOptions::Delta { delta: Some(true) }
        } else {
            SemanticTokensFullOptions::Bool(true)
        }),
        range: Some(range),
        work_done_progress_options: WorkDoneProgressOptions::default(),
    })
}

fn tokens_payload(result_id: Option<&str>, data: &[u32]) -> SemanticTokens {
    SemanticTokens {
        result_id: result_id.map(str::to_string),
        data: group_quintuples(data),
    }
}

fn token_edit(start: u32, delete_count: u32, data: &[u32]) -> SemanticTokensEdit {
    SemanticTokensEdit {
        start,
        delete_count,
        data: Some(group_quintuples(data)),
    }
}

/// Format the tracked token list into one line per token:
/// `<start_line>:<start_col>-<end_line>:<end_col> <category> [<modifiers>]`.
fn dump_tokens(store: &SessionStore, uri: &Uri) -> String {
    let Some(session) = store.get(uri) else {
        return "closed".to_string();
    };
    let session = session.lock();
    let Some(tokens) = session.tokens.as_ref() else {
        return "unknown".to_string();
    };
    if tokens.is_empty() {
        return "empty".to_string();
    }

    let lines: Vec<String> = tokens
        .iter()
        .map(|token| {
            let range = session.token_range(token).expect("tracked token has live anchors");
            let modifiers = if token.modifiers.is_empty() {
                String::new()
            } else {
                format!(" [{}]", token.modifiers.join(","))
            };
            format!(
                "{}:{}-{}:{} {}{}",
                range.start.line,
                range.start.character,
                range.end.line,
                range.end.character,
                token.category,
                modifiers,
            )
        })
        .collect();
    lines.join("\n")
}

fn style_at(store: &SessionStore, uri: &Uri, line: u32, character: u32) -> Option<Vec<String>> {
    let session = store.get(uri)?;
    let session = session.lock();
    session
        .overlays
        .style_at(Position::new(line, character))
        .cloned()
}

/// Provider answering every request with a fixed, pre-scripted response.
#[derive(Default)]
struct ScriptedProvider {
    full: Option<SemanticTokensResult>,
    delta: Option<SemanticTokensFullDeltaResult>,
    range: Option<SemanticTokensRangeResult>,
    full_requests: AtomicUsize,
    delta_requests: AtomicUsize,
    range_requests: AtomicUsize,
}

#[async_trait]
impl TokenProvider for ScriptedProvider {
    async fn semantic_tokens_full(
        &self,
        _uri: &Uri,
    ) -> Result<Option<SemanticTokensResult>, ProviderError> {
        self.full_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.full.clone())
    }

    async fn semantic_tokens_delta(
        &self,
        _uri: &Uri,
        _previous_result_id: &str,
    ) -> Result<Option<SemanticTokensFullDeltaResult>, ProviderError> {
        self.delta_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.delta.clone())
    }

    async fn semantic_tokens_range(
        &self,
        _uri: &Uri,
        _range: Range,
    ) -> Result<Option<SemanticTokensRangeResult>, ProviderError> {
        self.range_requests.fetch_add(1, Ordering::SeqCst);
        Ok(self.range.clone())
    }
}

/// Provider that closes the document while its response is in flight.
struct ClosingProvider {
    store: Arc<SessionStore>,
    uri: Uri,
    payload: SemanticTokens,
}

#[async_trait]
impl TokenProvider for ClosingProvider {
    async fn semantic_tokens_full(
        &self,
        _uri: &Uri,
    ) -> Result<Option<SemanticTokensResult>, ProviderError> {
        self.store.close(&self.uri);
        Ok(Some(SemanticTokensResult::Tokens(self.payload.clone())))
    }

    async fn semantic_tokens_delta(
        &self,
        _uri: &Uri,
        _previous_result_id: &str,
    ) -> Result<Option<SemanticTokensFullDeltaResult>, ProviderError> {
        Ok(None)
    }

    async fn semantic_tokens_range(
        &self,
        _uri: &Uri,
        _range: Range,
    ) -> Result<Option<SemanticTokensRangeResult>, ProviderError> {
        Ok(None)
    }
}

fn engine<P: TokenProvider + 'static>(
    provider: Arc<P>,
    capability: Capability,
) -> (Highlighter, Arc<SessionStore>) {
    let store = Arc::new(SessionStore::new());
    store.open(uri(), SOURCE.to_string(), 0);
    let highlighter = Highlighter::new(
        provider,
        Arc::clone(&store),
        capability,
        HighlightConfig::default(),
    );
    (highlighter, store)
}

// ---------------------------------------------------------------------------
// Tests — full refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn full_refresh_decodes_and_highlights() {
    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        ..Default::default()
    });
    let (highlighter, store) = engine(provider, capability(false, false));

    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Full);

    let expected = expect![[r#"
        0:5-0:9 keyword
        1:2-1:7 function"#]];
    expected.assert_eq(&dump_tokens(&store, &uri()));

    let session = store.get(&uri()).unwrap();
    let session = session.lock();
    assert_eq!(session.result_id.as_deref(), Some("r1"));
    assert_eq!(
        session.overlays.style_at(Position::new(0, 6)),
        Some(&vec!["token.keyword".to_string()])
    );
    assert_eq!(
        session.overlays.style_at(Position::new(1, 2)),
        Some(&vec!["token.function".to_string()])
    );
    // 4 + 5 highlighted cells, each marked for later restoration.
    assert_eq!(session.overlays.marked_cells(), 9);
}

#[tokio::test]
async fn null_response_changes_nothing() {
    let provider = Arc::new(ScriptedProvider::default());
    let (highlighter, store) = engine(provider, capability(false, false));

    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Unchanged);
    assert_eq!(dump_tokens(&store, &uri()), "unknown");
}

// ---------------------------------------------------------------------------
// Tests — delta refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delta_refresh_patches_in_place() {
    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        delta: Some(SemanticTokensFullDeltaResult::TokensDelta(
            SemanticTokensDelta {
                result_id: Some("r2".to_string()),
                edits: vec![token_edit(5, 5, &[1, 2, 5, 2, 0])],
            },
        )),
        ..Default::default()
    });
    let (highlighter, store) = engine(Arc::clone(&provider), capability(true, false));

    // No result id yet: the first refresh takes the full path.
    assert_eq!(
        highlighter.refresh(&uri(), None).await.unwrap(),
        RefreshOutcome::Full
    );
    assert_eq!(provider.full_requests.load(Ordering::SeqCst), 1);

    // Second refresh goes delta and replaces only the second token.
    assert_eq!(
        highlighter.refresh(&uri(), None).await.unwrap(),
        RefreshOutcome::Delta
    );
    assert_eq!(provider.delta_requests.load(Ordering::SeqCst), 1);

    let expected = expect![[r#"
        0:5-0:9 keyword
        1:2-1:7 variable"#]];
    expected.assert_eq(&dump_tokens(&store, &uri()));

    let session = store.get(&uri()).unwrap();
    let session = session.lock();
    assert_eq!(session.result_id.as_deref(), Some("r2"));
    assert_eq!(
        session.overlays.style_at(Position::new(1, 3)),
        Some(&vec!["token.variable".to_string()])
    );
    assert_eq!(
        session.overlays.style_at(Position::new(0, 6)),
        Some(&vec!["token.keyword".to_string()])
    );
}

#[tokio::test]
async fn server_may_answer_delta_with_full_snapshot() {
    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        delta: Some(SemanticTokensFullDeltaResult::Tokens(tokens_payload(
            Some("r9"),
            &[0, 0, 3, 0, 0],
        ))),
        ..Default::default()
    });
    let (highlighter, store) = engine(provider, capability(true, false));

    highlighter.refresh(&uri(), None).await.unwrap();
    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Full);

    let expected = expect![[r#"0:0-0:3 keyword"#]];
    expected.assert_eq(&dump_tokens(&store, &uri()));

    let session = store.get(&uri()).unwrap();
    let session = session.lock();
    assert_eq!(session.result_id.as_deref(), Some("r9"));
    // The previous highlights were unwound with the old list.
    assert_eq!(session.overlays.style_at(Position::new(0, 6)), None);
    assert_eq!(
        session.overlays.style_at(Position::new(0, 1)),
        Some(&vec!["token.keyword".to_string()])
    );
}

#[tokio::test]
async fn delta_rollback_resets_and_falls_back_to_full() {
    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        delta: Some(SemanticTokensFullDeltaResult::TokensDelta(
            SemanticTokensDelta {
                result_id: Some("r2".to_string()),
                edits: vec![token_edit(50, 5, &[])],
            },
        )),
        ..Default::default()
    });
    let (highlighter, store) = engine(Arc::clone(&provider), capability(true, false));

    highlighter.refresh(&uri(), None).await.unwrap();
    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Invalidated);
    assert_eq!(dump_tokens(&store, &uri()), "unknown");
    {
        let session = store.get(&uri()).unwrap();
        let session = session.lock();
        assert!(session.result_id.is_none());
        assert_eq!(session.live_anchor_count(), 0);
    }

    // With the result id cleared, the next refresh is full again.
    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Full);
    assert_eq!(provider.full_requests.load(Ordering::SeqCst), 2);
    assert_eq!(provider.delta_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn edits_shift_anchors_between_refreshes() {
    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        delta: Some(SemanticTokensFullDeltaResult::TokensDelta(
            SemanticTokensDelta {
                result_id: Some("r2".to_string()),
                edits: vec![token_edit(5, 5, &[1, 2, 5, 2, 0])],
            },
        )),
        ..Default::default()
    });
    let (highlighter, store) = engine(provider, capability(true, false));

    highlighter.refresh(&uri(), None).await.unwrap();

    // Insert a comment line on top while the next refresh is pending.
    {
        let session = store.get(&uri()).unwrap();
        let mut session = session.lock();
        assert!(session.apply_edit(
            Range::new(Position::new(0, 0), Position::new(0, 0)),
            "// note\n",
            1,
        ));
    }
    let expected = expect![[r#"
        1:5-1:9 keyword
        2:2-2:7 function"#]];
    expected.assert_eq(&dump_tokens(&store, &uri()));

    // The delta splice chains off the shifted predecessor anchor.
    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Delta);
    let expected = expect![[r#"
        1:5-1:9 keyword
        2:2-2:7 variable"#]];
    expected.assert_eq(&dump_tokens(&store, &uri()));
}

// ---------------------------------------------------------------------------
// Tests — range refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn range_refresh_is_ephemeral() {
    let provider = Arc::new(ScriptedProvider {
        range: Some(SemanticTokensRangeResult::Tokens(tokens_payload(
            None,
            &[1, 2, 5, 1, 0],
        ))),
        ..Default::default()
    });
    let (highlighter, store) = engine(Arc::clone(&provider), capability(false, true));

    let sub = Range::new(Position::new(1, 0), Position::new(1, 11));
    let outcome = highlighter.refresh(&uri(), Some(sub)).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Range);
    assert_eq!(provider.range_requests.load(Ordering::SeqCst), 1);

    // Sub-range results never clobber full-document state.
    assert_eq!(dump_tokens(&store, &uri()), "unknown");
    let session = store.get(&uri()).unwrap();
    let session = session.lock();
    assert!(session.result_id.is_none());
    assert_eq!(
        session.overlays.style_at(Position::new(1, 3)),
        Some(&vec!["token.function".to_string()])
    );
    // Ephemeral tokens release their anchors after the overlay pass.
    assert_eq!(session.live_anchor_count(), 0);
}

#[tokio::test]
async fn whole_document_range_takes_the_full_path() {
    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        ..Default::default()
    });
    let (highlighter, store) = engine(Arc::clone(&provider), capability(false, true));

    let full = store.get(&uri()).unwrap().lock().text.full_range();
    let outcome = highlighter.refresh(&uri(), Some(full)).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Full);
    assert_eq!(provider.range_requests.load(Ordering::SeqCst), 0);
    assert_eq!(provider.full_requests.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------------------
// Tests — eligibility and capability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn no_capability_is_a_blocking_error() {
    let provider = Arc::new(ScriptedProvider::default());
    let (highlighter, _store) = engine(
        provider,
        Capability::from_options(&SemanticTokensOptions {
            legend: SemanticTokensLegend {
                token_types: vec![],
                token_modifiers: vec![],
            },
            full: None,
            range: None,
            work_done_progress_options: WorkDoneProgressOptions::default(),
        }),
    );

    let result = highlighter.refresh(&uri(), None).await;
    assert!(matches!(result, Err(HighlightError::CapabilityUnsupported)));
}

#[tokio::test]
async fn response_for_closed_document_is_discarded() {
    let store = Arc::new(SessionStore::new());
    store.open(uri(), SOURCE.to_string(), 0);
    let provider = Arc::new(ClosingProvider {
        store: Arc::clone(&store),
        uri: uri(),
        payload: tokens_payload(Some("r1"), FULL_DATA),
    });
    let highlighter = Highlighter::new(
        provider,
        Arc::clone(&store),
        capability(false, false),
        HighlightConfig::default(),
    );

    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Discarded);
    assert!(store.get(&uri()).is_none());
}

#[tokio::test]
async fn disabled_engine_discards_refreshes() {
    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        ..Default::default()
    });
    let (highlighter, store) = engine(Arc::clone(&provider), capability(false, false));

    highlighter.set_enabled(false);
    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Discarded);
    assert_eq!(provider.full_requests.load(Ordering::SeqCst), 0);
    assert_eq!(dump_tokens(&store, &uri()), "unknown");

    highlighter.set_enabled(true);
    let outcome = highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(outcome, RefreshOutcome::Full);
}

// ---------------------------------------------------------------------------
// Tests — styling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn modifier_styles_stack_by_priority() {
    // Legend lists deprecated before static; priorities must win anyway.
    let capability = Capability::from_options(&SemanticTokensOptions {
        legend: SemanticTokensLegend {
            token_types: vec![SemanticTokenType::KEYWORD],
            token_modifiers: vec![
                SemanticTokenModifier::DEPRECATED,
                SemanticTokenModifier::STATIC,
            ],
        },
        full: Some(SemanticTokensFullOptions::Bool(true)),
        range: None,
        work_done_progress_options: WorkDoneProgressOptions::default(),
    });

    let mut config = HighlightConfig::default();
    config.modifiers.insert(
        "static".to_string(),
        ModifierStyle {
            style: "mod.static".to_string(),
            priority: 0,
        },
    );
    config.modifiers.insert(
        "deprecated".to_string(),
        ModifierStyle {
            style: "mod.deprecated".to_string(),
            priority: 10,
        },
    );

    let provider = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            &[0, 5, 4, 0, 0b11],
        ))),
        ..Default::default()
    });
    let store = Arc::new(SessionStore::new());
    store.open(uri(), SOURCE.to_string(), 0);
    let highlighter = Highlighter::new(provider, Arc::clone(&store), capability, config);

    highlighter.refresh(&uri(), None).await.unwrap();

    let expected = expect![[r#"0:5-0:9 keyword [deprecated,static]"#]];
    expected.assert_eq(&dump_tokens(&store, &uri()));
    assert_eq!(
        style_at(&store, &uri(), 0, 6),
        Some(vec![
            "token.keyword".to_string(),
            "mod.static".to_string(),
            "mod.deprecated".to_string(),
        ])
    );
}

#[tokio::test]
async fn second_full_refresh_restores_painted_styling() {
    let store = Arc::new(SessionStore::new());
    store.open(uri(), SOURCE.to_string(), 0);
    {
        let session = store.get(&uri()).unwrap();
        let mut session = session.lock();
        let session = &mut *session;
        let full = session.text.full_range();
        session
            .overlays
            .paint(&session.text, full, vec!["editor.base".to_string()]);
    }

    let first = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(
            Some("r1"),
            FULL_DATA,
        ))),
        ..Default::default()
    });
    let highlighter = Highlighter::new(
        first,
        Arc::clone(&store),
        capability(false, false),
        HighlightConfig::default(),
    );
    highlighter.refresh(&uri(), None).await.unwrap();
    assert_eq!(
        style_at(&store, &uri(), 0, 6),
        Some(vec!["token.keyword".to_string()])
    );

    // An empty snapshot unhighlights everything back to the painted base.
    let second = Arc::new(ScriptedProvider {
        full: Some(SemanticTokensResult::Tokens(tokens_payload(Some("r2"), &[]))),
        ..Default::default()
    });
    let highlighter = Highlighter::new(
        second,
        Arc::clone(&store),
        capability(false, false),
        HighlightConfig::default(),
    );
    highlighter.refresh(&uri(), None).await.unwrap();

    assert_eq!(dump_tokens(&store, &uri()), "empty");
    assert_eq!(
        style_at(&store, &uri(), 0, 6),
        Some(vec!["editor.base".to_string()])
    );
    assert_eq!(
        style_at(&store, &uri(), 1, 3),
        Some(vec!["editor.base".to_string()])
    );
}
