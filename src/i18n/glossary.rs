//! Terminology glossaries keyed by engine language pair.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glossary {
    #[serde(alias = "source_lang", alias = "sourceLocale")]
    pub source_locale: String,
    #[serde(alias = "target_lang", alias = "targetLocale")]
    pub target_locale: String,
    pub id: String,
}

/// Pick the glossary for an exact (source, target) engine-code pair.
///
/// The first configured match wins, so selection is deterministic for a
/// fixed table.
pub fn select_glossary<'a>(glossaries: &'a [Glossary], source: &str, target: &str) -> Option<&'a str> {
    glossaries
        .iter()
        .find(|g| g.source_locale == source && g.target_locale == target)
        .map(|g| g.id.as_str())
}
