//! Token legend handling and the client's contributed name lists.

use lsp_types::{
    SemanticTokenModifier, SemanticTokenType, SemanticTokensClientCapabilities,
    SemanticTokensClientCapabilitiesRequests, SemanticTokensFullOptions, SemanticTokensLegend,
    TokenFormat,
};

/// Ordered name tables from the negotiated legend, fixed per session.
///
/// Maps the wire's small integer codes (category index, modifier bitmask)
/// to names.
#[derive(Debug, Clone, Default)]
pub struct Legend {
    pub category_names: Vec<String>,
    pub modifier_names: Vec<String>,
}

impl Legend {
    pub fn new(category_names: Vec<String>, modifier_names: Vec<String>) -> Self {
        Self {
            category_names,
            modifier_names,
        }
    }

    /// Category name for a wire index.
    pub fn category(&self, index: u32) -> Option<&str> {
        self.category_names.get(index as usize).map(String::as_str)
    }

    /// Expand a modifier bitmask into names, in ascending bit order.
    /// Bits beyond the negotiated modifier list are ignored.
    pub fn modifiers_for_bitset(&self, bitset: u32) -> Vec<String> {
        self.modifier_names
            .iter()
            .take(32)
            .enumerate()
            .filter(|(bit, _)| bitset & (1 << bit) != 0)
            .map(|(_, name)| name.clone())
            .collect()
    }
}

impl From<&SemanticTokensLegend> for Legend {
    fn from(legend: &SemanticTokensLegend) -> Self {
        Self {
            category_names: legend
                .token_types
                .iter()
                .map(|t| t.as_str().to_string())
                .collect(),
            modifier_names: legend
                .token_modifiers
                .iter()
                .map(|m| m.as_str().to_string())
                .collect(),
        }
    }
}

/// Token categories this client understands, contributed to negotiation.
pub fn supported_token_types() -> Vec<SemanticTokenType> {
    vec![
        SemanticTokenType::NAMESPACE,
        SemanticTokenType::TYPE,
        SemanticTokenType::CLASS,
        SemanticTokenType::ENUM,
        SemanticTokenType::INTERFACE,
        SemanticTokenType::STRUCT,
        SemanticTokenType::TYPE_PARAMETER,
        SemanticTokenType::PARAMETER,
        SemanticTokenType::VARIABLE,
        SemanticTokenType::PROPERTY,
        SemanticTokenType::ENUM_MEMBER,
        SemanticTokenType::EVENT,
        SemanticTokenType::FUNCTION,
        SemanticTokenType::METHOD,
        SemanticTokenType::MACRO,
        SemanticTokenType::KEYWORD,
        SemanticTokenType::MODIFIER,
        SemanticTokenType::COMMENT,
        SemanticTokenType::STRING,
        SemanticTokenType::NUMBER,
        SemanticTokenType::REGEXP,
        SemanticTokenType::OPERATOR,
        SemanticTokenType::DECORATOR,
    ]
}

/// Token modifiers this client understands, contributed to negotiation.
pub fn supported_token_modifiers() -> Vec<SemanticTokenModifier> {
    vec![
        SemanticTokenModifier::DECLARATION,
        SemanticTokenModifier::DEFINITION,
        SemanticTokenModifier::READONLY,
        SemanticTokenModifier::STATIC,
        SemanticTokenModifier::DEPRECATED,
        SemanticTokenModifier::ABSTRACT,
        SemanticTokenModifier::ASYNC,
        SemanticTokenModifier::MODIFICATION,
        SemanticTokenModifier::DOCUMENTATION,
        SemanticTokenModifier::DEFAULT_LIBRARY,
    ]
}

/// The semantic token capabilities this client contributes during the
/// handshake. The handshake itself is the host's concern.
pub fn client_capabilities() -> SemanticTokensClientCapabilities {
    SemanticTokensClientCapabilities {
        requests: SemanticTokensClientCapabilitiesRequests {
            range: Some(true),
            full: Some(SemanticTokensFullOptions::Delta { delta: Some(true) }),
        },
        token_types: supported_token_types(),
        token_modifiers: supported_token_modifiers(),
        formats: vec![TokenFormat::RELATIVE],
        ..Default::default()
    }
}
