//! Conversion between stored field formats and the engine's transport
//! markup.
//!
//! Each [`FieldFormat`] has a [`FormatConverter`] selected through
//! [`converter_for`]. Plain text and HTML travel as-is; Markdown and
//! structured blocks are turned into HTML before translation and back
//! afterwards, so inline markup survives with tag handling enabled.

mod blocks;
mod html;
mod markdown;

use crate::entry::FieldFormat;
use crate::error::Result;
use serde_json::Value;

pub use blocks::BlocksConverter;
pub use markdown::MarkdownConverter;

/// How the engine should treat markup inside the submitted texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagHandling {
    Html,
}

impl TagHandling {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagHandling::Html => "html",
        }
    }
}

pub trait FormatConverter: Send + Sync {
    /// Encode a stored field value for transport. Missing values arrive as
    /// `Value::Null` and encode to an empty string.
    fn to_transport(&self, value: &Value) -> Result<String>;

    /// Decode a translated transport string into the stored representation.
    fn from_transport(&self, text: String) -> Result<Value>;
}

/// Passes text through untouched; used for plain text and HTML.
pub struct Passthrough;

impl FormatConverter for Passthrough {
    fn to_transport(&self, value: &Value) -> Result<String> {
        Ok(scalar_to_string(value))
    }

    fn from_transport(&self, text: String) -> Result<Value> {
        Ok(Value::String(text))
    }
}

static PASSTHROUGH: Passthrough = Passthrough;
static MARKDOWN: MarkdownConverter = MarkdownConverter;
static BLOCKS: BlocksConverter = BlocksConverter;

static CONVERTERS: [(FieldFormat, &dyn FormatConverter); 4] = [
    (FieldFormat::Plain, &PASSTHROUGH),
    (FieldFormat::Html, &PASSTHROUGH),
    (FieldFormat::Markdown, &MARKDOWN),
    (FieldFormat::Blocks, &BLOCKS),
];

pub fn converter_for(format: FieldFormat) -> &'static dyn FormatConverter {
    CONVERTERS
        .iter()
        .find(|(f, _)| *f == format)
        .map(|(_, converter)| *converter)
        .unwrap_or(&PASSTHROUGH)
}

/// Plain text disables tag handling; every other format travels as HTML.
pub fn tag_handling(format: FieldFormat) -> Option<TagHandling> {
    match format {
        FieldFormat::Plain => None,
        FieldFormat::Html | FieldFormat::Markdown | FieldFormat::Blocks => Some(TagHandling::Html),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_covers_every_format() {
        for format in [
            FieldFormat::Plain,
            FieldFormat::Html,
            FieldFormat::Markdown,
            FieldFormat::Blocks,
        ] {
            assert!(CONVERTERS.iter().any(|(f, _)| *f == format));
        }
    }

    #[test]
    fn test_plain_disables_tag_handling() {
        assert_eq!(tag_handling(FieldFormat::Plain), None);
        assert_eq!(tag_handling(FieldFormat::Markdown), Some(TagHandling::Html));
        assert_eq!(tag_handling(FieldFormat::Blocks), Some(TagHandling::Html));
        assert_eq!(tag_handling(FieldFormat::Html), Some(TagHandling::Html));
    }

    #[test]
    fn test_passthrough_missing_value_is_empty() {
        let converter = converter_for(FieldFormat::Plain);
        assert_eq!(converter.to_transport(&Value::Null).unwrap(), "");
        assert_eq!(converter.to_transport(&json!("Hello")).unwrap(), "Hello");
        assert_eq!(converter.to_transport(&json!(42)).unwrap(), "42");
    }

    #[test]
    fn test_passthrough_returns_string() {
        let converter = converter_for(FieldFormat::Html);
        assert_eq!(
            converter.from_transport("<p>Hallo</p>".to_string()).unwrap(),
            json!("<p>Hallo</p>")
        );
    }

    #[test]
    fn test_markdown_converter_selected() {
        let html = converter_for(FieldFormat::Markdown)
            .to_transport(&json!("**bold**"))
            .unwrap();
        assert!(html.contains("<strong>bold</strong>"));
    }
}
