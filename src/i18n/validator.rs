//! Translation quality validation module.
//!
//! Checks that markup sent with tag handling survived translation: the
//! engine is told to keep tags intact, but a dropped `<a>` or `<strong>`
//! silently loses links and emphasis once the result is converted back.

use regex::Regex;
use std::sync::OnceLock;

/// Validation report containing errors and warnings about a translation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    /// Critical errors that indicate translation issues
    pub errors: Vec<String>,

    /// Non-critical warnings about potential issues
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }
}

pub struct TranslationValidator;

static TAG_REGEX: OnceLock<Regex> = OnceLock::new();
static HREF_REGEX: OnceLock<Regex> = OnceLock::new();

impl TranslationValidator {
    /// Validate one translated text against its original.
    ///
    /// With `markup` set, the tag sequence and link targets are compared;
    /// an empty result for non-empty input is always an error.
    pub fn validate(original: &str, translated: &str, markup: bool) -> ValidationReport {
        let mut report = ValidationReport::new();

        if !original.trim().is_empty() && translated.trim().is_empty() {
            report
                .errors
                .push("Translation is empty for non-empty input".to_string());
        }

        if !markup {
            return report;
        }

        let orig_tags = Self::extract_tags(original);
        let trans_tags = Self::extract_tags(translated);
        if orig_tags != trans_tags {
            report.warnings.push(format!(
                "Tag mismatch: original has {:?}, translation has {:?}",
                orig_tags, trans_tags
            ));
        }

        let orig_links = Self::extract_hrefs(original);
        let trans_links = Self::extract_hrefs(translated);
        if orig_links != trans_links {
            report.warnings.push(format!(
                "Link mismatch: original has {} links, translation has {} links",
                orig_links.len(),
                trans_links.len()
            ));
        }

        report
    }

    /// Tag names in document order, closing tags prefixed with `/`.
    fn extract_tags(text: &str) -> Vec<String> {
        let regex = TAG_REGEX
            .get_or_init(|| Regex::new(r"<\s*(/?)\s*([a-zA-Z][a-zA-Z0-9]*)[^>]*>").unwrap());

        regex
            .captures_iter(text)
            .map(|cap| format!("{}{}", &cap[1], cap[2].to_lowercase()))
            .collect()
    }

    fn extract_hrefs(text: &str) -> Vec<String> {
        let regex =
            HREF_REGEX.get_or_init(|| Regex::new(r#"href\s*=\s*"([^"]*)""#).unwrap());

        let mut hrefs: Vec<String> = regex
            .captures_iter(text)
            .map(|cap| cap[1].to_string())
            .collect();
        hrefs.sort();
        hrefs
    }
}
