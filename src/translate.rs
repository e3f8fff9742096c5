//! Field translation: group an entry's translatable fields by format, send
//! each group through the dispatcher and write the results into a copy of
//! the entry.

use crate::dispatcher::{Dispatcher, TranslationRequest};
use crate::entry::{Entry, FieldFormat, TranslatableField};
use crate::error::{LocalizeError, Result};
use crate::format::converter_for;
use crate::limiter::Priority;
use crate::path::FieldPath;
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

pub struct Translator {
    dispatcher: Arc<Dispatcher>,
}

impl Translator {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Translate `fields` of `entry` from `source` to `target`.
    ///
    /// Only the listed paths change in the returned copy. Format groups run
    /// concurrently and all of them finish before the first error, if any,
    /// is returned.
    pub async fn translate(
        &self,
        entry: &Entry,
        source: &str,
        target: &str,
        fields: &[TranslatableField],
        priority: Priority,
    ) -> Result<Entry> {
        if source.is_empty() || target.is_empty() {
            return Err(LocalizeError::InvalidRequest(
                "source and target locale must be defined".to_string(),
            ));
        }
        if source == target {
            return Ok(entry.clone());
        }

        let groups = group_by_format(fields);
        debug!(
            "Translating entry {} {} -> {}: {} fields in {} format groups",
            entry.id,
            source,
            target,
            fields.len(),
            groups.len()
        );

        let results = join_all(groups.iter().map(|(format, paths)| {
            self.translate_group(entry, source, target, *format, paths, priority)
        }))
        .await;

        let mut translated = entry.clone();
        for result in results {
            for (path, value) in result? {
                translated.set(&path, value);
            }
        }
        Ok(translated)
    }

    async fn translate_group(
        &self,
        entry: &Entry,
        source: &str,
        target: &str,
        format: FieldFormat,
        paths: &[&FieldPath],
        priority: Priority,
    ) -> Result<Vec<(FieldPath, Value)>> {
        let converter = converter_for(format);
        let texts = paths
            .iter()
            .map(|path| converter.to_transport(entry.get(path).unwrap_or(&Value::Null)))
            .collect::<Result<Vec<_>>>()?;

        let translated = self
            .dispatcher
            .translate(TranslationRequest {
                texts,
                source_locale: source.to_string(),
                target_locale: target.to_string(),
                format,
                priority,
            })
            .await?;

        paths
            .iter()
            .zip(translated)
            .map(|(path, text)| Ok(((*path).clone(), converter.from_transport(text)?)))
            .collect()
    }
}

fn group_by_format(fields: &[TranslatableField]) -> BTreeMap<FieldFormat, Vec<&FieldPath>> {
    let mut groups: BTreeMap<FieldFormat, Vec<&FieldPath>> = BTreeMap::new();
    for field in fields {
        groups.entry(field.format).or_default().push(&field.path);
    }
    groups
}

/// Characters that translating `fields` of `entry` would send to the engine.
pub fn estimate_usage(entry: &Entry, fields: &[TranslatableField]) -> Result<usize> {
    fields.iter().try_fold(0, |total, field| {
        let value = entry.get(&field.path).unwrap_or(&Value::Null);
        let text = converter_for(field.format).to_transport(value)?;
        Ok(total + text.chars().count())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::limiter::RateLimiter;
    use proptest::prelude::*;
    use serde_json::json;
    use std::time::Duration;

    fn translator(engine: Arc<MockEngine>) -> Translator {
        Translator::new(Arc::new(Dispatcher::new(
            engine,
            RateLimiter::new(5, Duration::ZERO),
        )))
    }

    fn field(path: &str, format: FieldFormat) -> TranslatableField {
        TranslatableField::new(path.parse().unwrap(), format)
    }

    // ==================== Scenario Tests ====================

    #[tokio::test]
    async fn test_plain_title_to_german() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en").with_field("title", json!("Hello"));

        let result = translator(engine.clone())
            .translate(
                &entry,
                "en",
                "de",
                &[field("title", FieldFormat::Plain)],
                Priority::DEFAULT,
            )
            .await
            .unwrap();

        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].texts, vec!["Hello"]);
        assert_eq!(result.fields["title"], json!("HELLO"));
        // the copy keeps the source bookkeeping; callers stamp the locale
        assert_eq!(result.id, 1);
        assert_eq!(result.locale, "en");
    }

    #[tokio::test]
    async fn test_two_formats_issue_two_calls() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en")
            .with_field("title", json!("Hello"))
            .with_field("body", json!("Some **bold** text"));

        let result = translator(engine.clone())
            .translate(
                &entry,
                "en",
                "de",
                &[
                    field("title", FieldFormat::Plain),
                    field("body", FieldFormat::Markdown),
                ],
                Priority::DEFAULT,
            )
            .await
            .unwrap();

        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.texts.len() == 1));
        assert_eq!(result.fields["title"], json!("HELLO"));
        assert_eq!(result.fields["body"], json!("SOME **BOLD** TEXT"));
    }

    #[tokio::test]
    async fn test_fields_of_one_format_share_a_call() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en")
            .with_field("title", json!("a"))
            .with_field("subtitle", json!("b"));

        translator(engine.clone())
            .translate(
                &entry,
                "en",
                "de",
                &[
                    field("title", FieldFormat::Plain),
                    field("subtitle", FieldFormat::Plain),
                ],
                Priority::DEFAULT,
            )
            .await
            .unwrap();

        let calls = engine.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].texts, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_untouched_fields_survive() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en")
            .with_field("title", json!("Hello"))
            .with_field("views", json!(12))
            .with_field("seo", json!({"metaTitle": "Meta", "keywords": "kw"}));

        let result = translator(engine)
            .translate(
                &entry,
                "en",
                "fr",
                &[
                    field("title", FieldFormat::Plain),
                    field("seo.metaTitle", FieldFormat::Plain),
                ],
                Priority::DEFAULT,
            )
            .await
            .unwrap();

        assert_eq!(result.fields["views"], json!(12));
        assert_eq!(
            result.fields["seo"],
            json!({"metaTitle": "META", "keywords": "kw"})
        );
        // the input entry is not modified
        assert_eq!(entry.fields["title"], json!("Hello"));
    }

    #[tokio::test]
    async fn test_missing_path_sends_empty_text() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en").with_field("title", json!("Hello"));

        let result = translator(engine.clone())
            .translate(
                &entry,
                "en",
                "de",
                &[
                    field("title", FieldFormat::Plain),
                    field("subtitle", FieldFormat::Plain),
                ],
                Priority::DEFAULT,
            )
            .await
            .unwrap();

        assert_eq!(engine.calls()[0].texts, vec!["Hello", ""]);
        assert_eq!(result.fields["subtitle"], json!(""));
    }

    #[tokio::test]
    async fn test_blocks_field_roundtrips_through_markup() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en").with_field(
            "content",
            json!([{"type": "paragraph", "children": [
                {"type": "text", "text": "Hello "},
                {"type": "text", "text": "world", "bold": true}
            ]}]),
        );

        let result = translator(engine.clone())
            .translate(
                &entry,
                "en",
                "de",
                &[field("content", FieldFormat::Blocks)],
                Priority::DEFAULT,
            )
            .await
            .unwrap();

        assert_eq!(
            engine.calls()[0].texts,
            vec!["<p>Hello <strong>world</strong></p>"]
        );
        assert_eq!(
            result.fields["content"],
            json!([{"type": "paragraph", "children": [
                {"type": "text", "text": "HELLO "},
                {"type": "text", "text": "WORLD", "bold": true}
            ]}])
        );
    }

    // ==================== Failure Tests ====================

    #[tokio::test]
    async fn test_missing_locale_is_invalid() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en").with_field("title", json!("Hello"));

        let err = translator(engine.clone())
            .translate(
                &entry,
                "",
                "de",
                &[field("title", FieldFormat::Plain)],
                Priority::DEFAULT,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LocalizeError::InvalidRequest(_)));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failing_group_fails_translate_after_all_groups_ran() {
        let engine = Arc::new(MockEngine::new().failing_on("broken"));
        let entry = Entry::new(1, "en")
            .with_field("title", json!("broken"))
            .with_field("body", json!("fine"));

        let err = translator(engine.clone())
            .translate(
                &entry,
                "en",
                "de",
                &[
                    field("title", FieldFormat::Plain),
                    field("body", FieldFormat::Markdown),
                ],
                Priority::DEFAULT,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LocalizeError::EngineFailure(_)));
        assert_eq!(engine.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_conversion_failure_fails_translate() {
        let engine = Arc::new(MockEngine::new());
        let entry = Entry::new(1, "en").with_field("content", json!({"not": "blocks"}));

        let err = translator(engine.clone())
            .translate(
                &entry,
                "en",
                "de",
                &[field("content", FieldFormat::Blocks)],
                Priority::DEFAULT,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LocalizeError::Conversion { .. }));
        assert!(engine.calls().is_empty());
    }

    // ==================== Usage Estimate Tests ====================

    #[test]
    fn test_estimate_usage_counts_transport_characters() {
        let entry = Entry::new(1, "en")
            .with_field("title", json!("Hello"))
            .with_field("body", json!("**hi**"));
        let estimate = estimate_usage(
            &entry,
            &[
                field("title", FieldFormat::Plain),
                field("body", FieldFormat::Markdown),
                field("missing", FieldFormat::Plain),
            ],
        )
        .unwrap();
        // "<p><strong>hi</strong></p>\n" is 27 characters
        assert_eq!(estimate, 5 + 27);
    }

    // ==================== Identity Law ====================

    proptest! {
        #[test]
        fn prop_same_locale_is_identity(
            locale in "[a-z]{2}",
            title in ".{0,20}",
            priority in 0i32..10,
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let engine = Arc::new(MockEngine::new());
            let entry = Entry::new(7, locale.clone()).with_field("title", json!(title));

            let result = runtime.block_on(translator(engine.clone()).translate(
                &entry,
                &locale,
                &locale,
                &[field("title", FieldFormat::Plain), field("body", FieldFormat::Blocks)],
                Priority(priority),
            ));

            prop_assert_eq!(result.unwrap(), entry);
            prop_assert!(engine.calls().is_empty());
        }
    }
}
