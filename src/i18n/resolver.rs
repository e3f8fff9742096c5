//! Locale resolution: internal locale codes to engine codes.
//!
//! An explicit override table wins; otherwise the code is normalized
//! against the [`LanguageRegistry`]. The engine accepts generic codes as
//! source but requires a region for some targets (`en` -> `EN-US`), so the
//! direction matters.

use crate::error::{LocalizeError, Result};
use crate::i18n::LanguageRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocaleDirection {
    Source,
    Target,
}

impl fmt::Display for LocaleDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocaleDirection::Source => f.write_str("source"),
            LocaleDirection::Target => f.write_str("target"),
        }
    }
}

/// Override for one internal code: either the same engine code for both
/// directions, or one per direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocaleOverride {
    Both(String),
    PerDirection {
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        target: Option<String>,
    },
}

impl LocaleOverride {
    fn for_direction(&self, direction: LocaleDirection) -> Option<&str> {
        match (self, direction) {
            (LocaleOverride::Both(code), _) => Some(code),
            (LocaleOverride::PerDirection { source, .. }, LocaleDirection::Source) => {
                source.as_deref()
            }
            (LocaleOverride::PerDirection { target, .. }, LocaleDirection::Target) => {
                target.as_deref()
            }
        }
    }
}

/// Internal locale code -> engine code override table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleMap(HashMap<String, LocaleOverride>);

impl LocaleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, locale: impl Into<String>, mapping: LocaleOverride) {
        self.0.insert(locale.into(), mapping);
    }

    fn lookup(&self, code: &str, direction: LocaleDirection) -> Option<&str> {
        self.0
            .get(code)
            .or_else(|| self.0.get(&code.to_uppercase()))
            .and_then(|mapping| mapping.for_direction(direction))
    }
}

/// Resolve an internal locale code to the code the engine expects.
pub fn resolve_locale(code: &str, overrides: &LocaleMap, direction: LocaleDirection) -> Result<String> {
    if let Some(mapped) = overrides.lookup(code, direction) {
        return Ok(mapped.to_string());
    }

    let unsupported = || LocalizeError::UnsupportedLocale {
        code: code.to_string(),
        direction,
    };

    let normalized = code.trim().replace('_', "-").to_uppercase();
    let base = normalized.split('-').next().unwrap_or_default();
    let language = LanguageRegistry::get()
        .get_by_code(base)
        .ok_or_else(unsupported)?;

    match direction {
        LocaleDirection::Source => Ok(language.code.to_string()),
        LocaleDirection::Target => {
            if let Some(variant) = language
                .target_variants
                .iter()
                .find(|variant| **variant == normalized)
            {
                Ok((*variant).to_string())
            } else {
                Ok(language
                    .default_target
                    .unwrap_or(language.code)
                    .to_string())
            }
        }
    }
}
