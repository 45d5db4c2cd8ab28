//! Error taxonomy for the highlighting engine.

use thiserror::Error;

/// Errors raised while refreshing semantic tokens for a document.
///
/// Only [`CapabilityUnsupported`](HighlightError::CapabilityUnsupported)
/// and [`Provider`](HighlightError::Provider) escape a refresh; malformed
/// payloads and delta inconsistencies are contained by resetting the
/// document's token state, after which the next refresh falls back to a
/// full request.
#[derive(Debug, Error)]
pub enum HighlightError {
    /// The raw token payload cannot be interpreted against the negotiated
    /// legend or the cached token list.
    #[error("malformed semantic token payload: {0}")]
    MalformedPayload(String),

    /// A delta edit does not line up with the cached token list.
    #[error("semantic token delta inconsistent with cached state: {0}")]
    DeltaInconsistency(String),

    /// The server advertises no retrieval method usable for this request.
    #[error("no usable semantic token capability")]
    CapabilityUnsupported,

    /// The request to the server failed.
    #[error("semantic token request failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Transport-level failure reported by a
/// [`TokenProvider`](crate::TokenProvider).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProviderError(pub String);
