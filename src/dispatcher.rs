//! Chunked, rate-limited dispatch of translation requests to the engine.

use crate::chunk::{self, ChunkLimits};
use crate::engine::{ApiOptions, EngineRequest, TranslationEngine};
use crate::entry::FieldFormat;
use crate::error::{LocalizeError, Result};
use crate::format;
use crate::i18n::{
    resolve_locale, select_glossary, DispatchMetrics, Glossary, LocaleDirection, LocaleMap,
    TranslationValidator,
};
use crate::limiter::{Priority, RateLimiter};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Texts of one format to translate between two internal locale codes.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub texts: Vec<String>,
    pub source_locale: String,
    pub target_locale: String,
    pub format: FieldFormat,
    pub priority: Priority,
}

pub struct Dispatcher {
    engine: Arc<dyn TranslationEngine>,
    limiter: RateLimiter,
    glossaries: Vec<Glossary>,
    locale_map: LocaleMap,
    options: ApiOptions,
    metrics: &'static DispatchMetrics,
}

impl Dispatcher {
    pub fn new(engine: Arc<dyn TranslationEngine>, limiter: RateLimiter) -> Self {
        Self {
            engine,
            limiter,
            glossaries: Vec::new(),
            locale_map: LocaleMap::new(),
            options: ApiOptions::default(),
            metrics: DispatchMetrics::global(),
        }
    }

    pub fn with_glossaries(mut self, glossaries: Vec<Glossary>) -> Self {
        self.glossaries = glossaries;
        self
    }

    pub fn with_locale_map(mut self, locale_map: LocaleMap) -> Self {
        self.locale_map = locale_map;
        self
    }

    pub fn with_options(mut self, options: ApiOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_metrics(mut self, metrics: &'static DispatchMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn limits(&self) -> ChunkLimits {
        self.engine.limits()
    }

    /// Translate `request.texts`, returning results aligned with the input.
    ///
    /// Every chunk runs to completion; if any chunk failed the whole request
    /// fails and no partial result is returned.
    pub async fn translate(&self, request: TranslationRequest) -> Result<Vec<String>> {
        if request.texts.is_empty() {
            return Ok(Vec::new());
        }
        if request.source_locale.is_empty() || request.target_locale.is_empty() {
            return Err(LocalizeError::InvalidRequest(
                "source and target locale must be defined".to_string(),
            ));
        }

        let source_lang = resolve_locale(
            &request.source_locale,
            &self.locale_map,
            LocaleDirection::Source,
        )?;
        let target_lang = resolve_locale(
            &request.target_locale,
            &self.locale_map,
            LocaleDirection::Target,
        )?;

        if self.options.glossary.is_some() {
            warn!("Glossary provided in API options is ignored; glossaries are selected per language pair");
        }
        let glossary_id = select_glossary(&self.glossaries, &source_lang, &target_lang)
            .map(str::to_string);
        let tag_handling = format::tag_handling(request.format);

        self.metrics.record_request();

        let ranges = chunk::split(&request.texts, self.engine.limits());
        debug!(
            "Dispatching {} {} texts {} -> {} in {} chunks (priority {})",
            request.texts.len(),
            request.format,
            source_lang,
            target_lang,
            ranges.len(),
            request.priority.0
        );

        let calls = ranges.into_iter().map(|range| {
            let engine_request = EngineRequest {
                texts: request.texts[range].to_vec(),
                source_lang: source_lang.clone(),
                target_lang: target_lang.clone(),
                tag_handling,
                glossary_id: glossary_id.clone(),
                formality: self.options.formality.clone(),
                preserve_formatting: self.options.preserve_formatting,
            };
            self.limiter
                .schedule(request.priority, self.call_engine(engine_request))
        });

        let results = join_all(calls)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        let translated = chunk::reassemble(results);

        let markup = tag_handling.is_some();
        for (original, result) in request.texts.iter().zip(&translated) {
            let report = TranslationValidator::validate(original, result, markup);
            if !report.is_clean() {
                warn!(
                    "Translation validation for {} -> {}: errors {:?}, warnings {:?}",
                    source_lang, target_lang, report.errors, report.warnings
                );
            }
        }

        Ok(translated)
    }

    async fn call_engine(&self, request: EngineRequest) -> Result<Vec<String>> {
        let metrics = self.metrics;
        let expected = request.texts.len();
        metrics.record_api_call(request.texts.iter().map(|t| t.chars().count()).sum());

        match self.engine.translate(request).await {
            Ok(translated) if translated.len() == expected => Ok(translated),
            Ok(translated) => {
                metrics.record_api_failure();
                Err(LocalizeError::EngineFailure(format!(
                    "engine returned {} texts for a chunk of {}",
                    translated.len(),
                    expected
                )))
            }
            Err(e) => {
                metrics.record_api_failure();
                Err(e)
            }
        }
    }

    /// Characters consumed on the engine account.
    pub async fn usage(&self) -> Result<u64> {
        self.engine.usage().await
    }
}
