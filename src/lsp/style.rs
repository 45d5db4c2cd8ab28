//! Token category and modifier to style resolution.

use crate::document::StyleStack;
use crate::settings::HighlightConfig;

/// Resolve the style stack for a token.
///
/// The category's base style comes first, then the styles of any known
/// modifiers in ascending priority; the sort is stable, so equal
/// priorities keep the order the modifiers were listed in. A category
/// absent from the table yields no visible style — the token stays
/// tracked, just unstyled. Unknown modifiers are skipped.
pub fn resolve_styles(
    category: &str,
    modifiers: &[String],
    config: &HighlightConfig,
) -> Option<StyleStack> {
    let base = config.categories.get(category)?;
    let mut stack = vec![base.clone()];

    let mut modifier_styles: Vec<(i32, &str)> = modifiers
        .iter()
        .filter_map(|name| {
            config
                .modifiers
                .get(name)
                .map(|m| (m.priority, m.style.as_str()))
        })
        .collect();
    modifier_styles.sort_by_key(|(priority, _)| *priority);
    stack.extend(modifier_styles.into_iter().map(|(_, style)| style.to_string()));

    Some(stack)
}
