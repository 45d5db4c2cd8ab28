//! Decoding of the relative-encoded semantic token stream.

use lsp_types::{Position, SemanticToken};

use crate::document::{DocumentSession, LineIndex, Token};
use crate::error::HighlightError;

use super::legend::Legend;

/// Group a raw flat integer array into quintuple records.
///
/// A trailing remainder that is not a full quintuple is ignored.
pub fn group_quintuples(data: &[u32]) -> Vec<SemanticToken> {
    data.chunks_exact(5)
        .map(|quintuple| SemanticToken {
            delta_line: quintuple[0],
            delta_start: quintuple[1],
            length: quintuple[2],
            token_type: quintuple[3],
            token_modifiers_bitset: quintuple[4],
        })
        .collect()
}

/// Decode `data` into absolute-position tokens, allocating anchors in
/// `session`.
///
/// Each record is relative to the start of the token before it; `previous`
/// seeds that chain with the current start position of the token
/// immediately preceding the decoded run, if any. Ownership of the
/// allocated anchors passes to the caller with the returned tokens; a
/// failed call releases everything it allocated before returning.
pub fn decode_tokens(
    session: &mut DocumentSession,
    data: &[SemanticToken],
    legend: &Legend,
    previous: Option<Position>,
) -> Result<Vec<Token>, HighlightError> {
    let mut decoded: Vec<Token> = Vec::with_capacity(data.len());
    let (mut line, mut character) = match previous {
        Some(position) => (position.line, position.character),
        None => (0, 0),
    };

    for record in data {
        line += record.delta_line;
        character = if record.delta_line != 0 {
            record.delta_start
        } else {
            character + record.delta_start
        };

        let category = match legend.category(record.token_type) {
            Some(name) => name.to_string(),
            None => {
                for token in &decoded {
                    session.release_token(token);
                }
                return Err(HighlightError::MalformedPayload(format!(
                    "token category index {} exceeds legend of {} entries",
                    record.token_type,
                    legend.category_names.len(),
                )));
            }
        };
        let modifiers = legend.modifiers_for_bitset(record.token_modifiers_bitset);

        let start = Position::new(line, character);
        let end = end_of_token(&session.text, start, record.length);
        decoded.push(Token {
            start: session.anchors.create(start),
            end: session.anchors.create(end),
            category,
            modifiers,
        });
    }

    Ok(decoded)
}

/// Walk `length` UTF-16 units forward from `start`, wrapping at line
/// boundaries; the extra unit consumed per wrapped line is the terminator.
///
/// A length that lands exactly on a line end wraps the end position to the
/// start of the next line; running past the last line clamps to the
/// document end.
fn end_of_token(text: &LineIndex, start: Position, length: u32) -> Position {
    let mut line = start.line;
    let mut character = start.character;
    let mut remaining = i64::from(length);

    loop {
        let Some(line_len) = text.line_len_utf16(line) else {
            return text.end_position();
        };
        let available = i64::from(line_len.saturating_sub(character));
        if remaining < available {
            return Position::new(line, character + remaining as u32);
        }
        remaining -= available + 1;
        line += 1;
        character = 0;
        if remaining <= 0 {
            if line >= text.line_count() {
                return text.end_position();
            }
            return Position::new(line, 0);
        }
    }
}
