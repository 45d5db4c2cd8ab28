//! Incremental patching of the tracked token list from delta responses.

use lsp_types::{Position, Range, SemanticTokensEdit};

use crate::document::{DocumentSession, Token};
use crate::error::HighlightError;

use super::decode::decode_tokens;
use super::legend::Legend;

/// Tokens affected by a successfully applied delta, for the overlay pass.
#[derive(Debug, Default)]
pub struct DeltaOutcome {
    /// Former ranges of removed tokens, resolved before their anchors
    /// were released.
    pub removed: Vec<Range>,
    /// Newly inserted tokens (clones of the tracked entries).
    pub inserted: Vec<Token>,
}

/// Apply a delta response's edit operations to the tracked token list.
///
/// Edits are applied in order, each against the list as the previous edit
/// left it. The apply is atomic with respect to failure: any inconsistency
/// rolls the whole session back to `(unknown, none)` and returns the
/// error, never a partially patched list.
pub fn apply_token_edits(
    session: &mut DocumentSession,
    edits: &[SemanticTokensEdit],
    legend: &Legend,
) -> Result<DeltaOutcome, HighlightError> {
    let mut outcome = DeltaOutcome::default();

    for edit in edits {
        if let Err(error) = apply_one(session, edit, legend, &mut outcome) {
            session.invalidate_tokens();
            return Err(error);
        }
    }

    Ok(outcome)
}

fn apply_one(
    session: &mut DocumentSession,
    edit: &SemanticTokensEdit,
    legend: &Legend,
    outcome: &mut DeltaOutcome,
) -> Result<(), HighlightError> {
    // Wire indices count raw integers, five per token.
    if edit.start % 5 != 0 || edit.delete_count % 5 != 0 {
        return Err(HighlightError::MalformedPayload(format!(
            "edit indices are not token aligned: start {} delete {}",
            edit.start, edit.delete_count
        )));
    }
    let start_index = (edit.start / 5) as usize;
    let delete_count = (edit.delete_count / 5) as usize;

    let previous = splice_predecessor(session, start_index, delete_count)?;

    let data = edit.data.as_deref().unwrap_or(&[]);
    let inserted = decode_tokens(session, data, legend, previous)?;

    let removed: Vec<Token> = match session.tokens.as_mut() {
        Some(tokens) => tokens
            .splice(start_index..start_index + delete_count, inserted.iter().cloned())
            .collect(),
        None => Vec::new(),
    };
    for token in &removed {
        if let Some(range) = session.token_range(token) {
            outcome.removed.push(range);
        }
        session.release_token(token);
    }
    outcome.inserted.extend(inserted);

    Ok(())
}

/// Bounds-check one splice and resolve the start position of the token
/// right before it, which seeds relative decoding of the inserted run.
fn splice_predecessor(
    session: &DocumentSession,
    start_index: usize,
    delete_count: usize,
) -> Result<Option<Position>, HighlightError> {
    let Some(tokens) = session.tokens.as_ref() else {
        return Err(HighlightError::DeltaInconsistency(
            "no cached token list to patch".to_string(),
        ));
    };
    if start_index + delete_count > tokens.len() {
        return Err(HighlightError::MalformedPayload(format!(
            "edit range {}..{} exceeds {} cached tokens",
            start_index,
            start_index + delete_count,
            tokens.len()
        )));
    }
    match start_index.checked_sub(1).map(|index| &tokens[index]) {
        Some(token) => match session.token_range(token) {
            Some(range) => Ok(Some(range.start)),
            None => Err(HighlightError::DeltaInconsistency(
                "anchor of the token before the splice was released".to_string(),
            )),
        },
        None => Ok(None),
    }
}
