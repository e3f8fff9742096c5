//! Content entries and the fields selected for translation.

use crate::path::FieldPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type EntryId = i64;

/// Reference to a sibling entry of the same localization group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationRef {
    pub id: EntryId,
    pub locale: String,
}

/// One locale's version of a content item.
///
/// Everything that is not bookkeeping lives in `fields` and is addressed
/// with [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: EntryId,
    pub locale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub localizations: Vec<LocalizationRef>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Entry {
    pub fn new(id: EntryId, locale: impl Into<String>) -> Self {
        Self {
            id,
            locale: locale.into(),
            published_at: None,
            localizations: Vec::new(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        path.get(&self.fields)
    }

    pub fn set(&mut self, path: &FieldPath, value: Value) {
        path.set(&mut self.fields, value);
    }

    pub fn to_ref(&self) -> LocalizationRef {
        LocalizationRef {
            id: self.id,
            locale: self.locale.clone(),
        }
    }

    pub fn localization_for(&self, locale: &str) -> Option<&LocalizationRef> {
        self.localizations.iter().find(|l| l.locale == locale)
    }
}

/// Data for an entry that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    pub locale: String,
    pub published_at: Option<DateTime<Utc>>,
    pub fields: Map<String, Value>,
}

/// How a field's content must be encoded for the translation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    Plain,
    Html,
    Markdown,
    /// Structured rich-text blocks stored as JSON
    #[serde(rename = "jsonb")]
    Blocks,
}

impl FieldFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldFormat::Plain => "plain",
            FieldFormat::Html => "html",
            FieldFormat::Markdown => "markdown",
            FieldFormat::Blocks => "jsonb",
        }
    }
}

impl fmt::Display for FieldFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatableField {
    #[serde(rename = "field")]
    pub path: FieldPath,
    pub format: FieldFormat,
}

impl TranslatableField {
    pub fn new(path: FieldPath, format: FieldFormat) -> Self {
        Self { path, format }
    }

    /// Shorthand for a top-level attribute.
    pub fn top_level(name: &str, format: FieldFormat) -> Self {
        Self::new(FieldPath::key(name), format)
    }
}
