use crate::dispatcher::Dispatcher;
use crate::engine::{ApiOptions, DeepLEngine, TranslationEngine};
use crate::i18n::{Glossary, LocaleMap};
use crate::limiter::{RateLimiter, DEFAULT_MAX_CONCURRENT, DEFAULT_MIN_INTERVAL};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Minimum interval between engine calls when `APP_ENV=test`
const TEST_MIN_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: String,

    // DeepL
    pub deepl_api_key: String,
    pub deepl_api_url: Option<String>,
    pub locale_map: LocaleMap,
    pub glossaries: Vec<Glossary>,
    pub api_options: ApiOptions,

    // Rate limiting
    pub max_concurrent: usize,
    pub min_interval: Duration,

    // Sibling preparation
    pub regenerate_uids: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let app_env = std::env::var("APP_ENV").unwrap_or_else(|_| "production".to_string());
        let default_interval = if app_env == "test" {
            TEST_MIN_INTERVAL
        } else {
            DEFAULT_MIN_INTERVAL
        };

        Ok(Self {
            // DeepL
            deepl_api_key: std::env::var("DEEPL_API_KEY").context("DEEPL_API_KEY not set")?,
            deepl_api_url: std::env::var("DEEPL_API_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            locale_map: json_var("DEEPL_LOCALE_MAP")?.unwrap_or_default(),
            glossaries: json_var("DEEPL_GLOSSARIES")?.unwrap_or_default(),
            api_options: json_var("DEEPL_API_OPTIONS")?.unwrap_or_default(),

            // Rate limiting
            max_concurrent: std::env::var("DEEPL_MAX_CONCURRENT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_MAX_CONCURRENT),
            min_interval: std::env::var("DEEPL_MIN_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default_interval),

            regenerate_uids: std::env::var("TRANSLATE_REGENERATE_UIDS")
                .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
                .unwrap_or(false),

            app_env,
        })
    }

    pub fn engine(&self) -> DeepLEngine {
        DeepLEngine::new(self.deepl_api_key.clone(), self.deepl_api_url.clone())
    }

    pub fn limiter(&self) -> RateLimiter {
        RateLimiter::new(self.max_concurrent, self.min_interval)
    }

    /// Dispatcher over `engine` carrying the configured locale map,
    /// glossaries and engine options.
    pub fn dispatcher(&self, engine: Arc<dyn TranslationEngine>) -> Dispatcher {
        Dispatcher::new(engine, self.limiter())
            .with_locale_map(self.locale_map.clone())
            .with_glossaries(self.glossaries.clone())
            .with_options(self.api_options.clone())
    }
}

/// Parse an optional JSON-valued environment variable.
fn json_var<T: DeserializeOwned>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
            .map(Some)
            .with_context(|| format!("{} is not valid JSON", name)),
        _ => Ok(None),
    }
}
