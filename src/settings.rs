//! Settings infrastructure for the highlighting engine.
//!
//! This module loads `settings.toml` files into the static style tables
//! consumed by the overlay pass: token category name -> style name,
//! modifier name -> style and stacking priority, plus the delta preference
//! and the feature switch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Highlighting configuration.
    pub highlight: Option<HighlightSettings>,
}

/// Raw highlighting settings as written in settings.toml.
#[derive(Debug, Default, Deserialize)]
pub struct HighlightSettings {
    /// Whether semantic highlighting is enabled (default: true).
    pub enabled: Option<bool>,

    /// Prefer delta requests when the server supports them (default: true).
    pub prefer_delta: Option<bool>,

    /// Token category name -> style name. Entries override the defaults
    /// per key.
    pub categories: Option<HashMap<String, String>>,

    /// Token modifier name -> style and stacking priority.
    pub modifiers: Option<HashMap<String, ModifierSetting>>,
}

/// Style and priority for one token modifier, as written in settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModifierSetting {
    pub style: String,
    /// Stacking priority in [-100, 100]; higher applies later. Default 0.
    pub priority: Option<i32>,
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct HighlightConfig {
    pub enabled: bool,
    pub prefer_delta: bool,
    /// Token category name -> style name.
    pub categories: HashMap<String, String>,
    /// Token modifier name -> style and stacking priority.
    pub modifiers: HashMap<String, ModifierStyle>,
}

/// Resolved style and priority for one token modifier.
#[derive(Debug, Clone)]
pub struct ModifierStyle {
    pub style: String,
    pub priority: i32,
}

impl Default for HighlightConfig {
    /// Default tables cover the standard LSP token types and modifiers,
    /// mapping each name to a `token.<name>` style.
    fn default() -> Self {
        let categories = crate::lsp::supported_token_types()
            .iter()
            .map(|t| (t.as_str().to_string(), format!("token.{}", t.as_str())))
            .collect();
        let modifiers = crate::lsp::supported_token_modifiers()
            .iter()
            .map(|m| {
                (
                    m.as_str().to_string(),
                    ModifierStyle {
                        style: format!("token.modifier.{}", m.as_str()),
                        priority: 0,
                    },
                )
            })
            .collect();
        Self {
            enabled: true,
            prefer_delta: true,
            categories,
            modifiers,
        }
    }
}

impl HighlightConfig {
    /// Resolve raw settings over the defaults, clamping modifier
    /// priorities to [-100, 100].
    pub fn from_settings(settings: &Settings) -> Self {
        let mut config = Self::default();
        let Some(highlight) = settings.highlight.as_ref() else {
            return config;
        };

        if let Some(enabled) = highlight.enabled {
            config.enabled = enabled;
        }
        if let Some(prefer_delta) = highlight.prefer_delta {
            config.prefer_delta = prefer_delta;
        }
        if let Some(categories) = &highlight.categories {
            for (name, style) in categories {
                config.categories.insert(name.clone(), style.clone());
            }
        }
        if let Some(modifiers) = &highlight.modifiers {
            for (name, setting) in modifiers {
                let priority = setting.priority.unwrap_or(0);
                let clamped = priority.clamp(-100, 100);
                if clamped != priority {
                    warn!(
                        modifier = name.as_str(),
                        priority, "modifier priority clamped to [-100, 100]"
                    );
                }
                config.modifiers.insert(
                    name.clone(),
                    ModifierStyle {
                        style: setting.style.clone(),
                        priority: clamped,
                    },
                );
            }
        }

        config
    }
}

/// Load settings from a settings.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to parse settings.toml");
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover settings.toml by searching up the directory tree.
///
/// Returns `(settings, settings_dir)` where `settings_dir` is the
/// directory containing the found settings.toml. If not found, returns
/// `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join("settings.toml");
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }
    (Settings::default(), start_dir.to_path_buf())
}
