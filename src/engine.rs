//! External translation engine and its DeepL implementation.

use crate::chunk::ChunkLimits;
use crate::error::{LocalizeError, Result};
use crate::format::TagHandling;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Paid-plan API endpoint
pub const DEEPL_API_URL: &str = "https://api.deepl.com";

/// Free-plan API endpoint, used for keys ending in `:fx`
pub const DEEPL_FREE_API_URL: &str = "https://api-free.deepl.com";

/// One engine call: a single chunk of texts for one language pair.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRequest {
    pub texts: Vec<String>,
    /// Resolved engine source code, e.g. `EN`
    pub source_lang: String,
    /// Resolved engine target code, e.g. `EN-US`
    pub target_lang: String,
    pub tag_handling: Option<TagHandling>,
    pub glossary_id: Option<String>,
    pub formality: Option<String>,
    pub preserve_formatting: Option<bool>,
}

/// Pass-through engine options supplied by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOptions {
    #[serde(default)]
    pub formality: Option<String>,
    /// Never forwarded: glossaries are selected per language pair.
    #[serde(default)]
    pub glossary: Option<String>,
    #[serde(default, alias = "preserve_formatting")]
    pub preserve_formatting: Option<bool>,
}

#[async_trait]
pub trait TranslationEngine: Send + Sync {
    /// Translate one chunk. The result is aligned index-for-index with
    /// `request.texts`.
    async fn translate(&self, request: EngineRequest) -> Result<Vec<String>>;

    /// Characters consumed in the current billing period.
    async fn usage(&self) -> Result<u64>;

    /// Per-call bounds the caller must respect.
    fn limits(&self) -> ChunkLimits {
        ChunkLimits::deepl()
    }
}

/// DeepL `/v2/translate` request body
#[derive(Debug, Serialize)]
struct TranslateBody<'a> {
    text: &'a [String],
    source_lang: &'a str,
    target_lang: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag_handling: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    glossary_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    formality: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    preserve_formatting: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    character_count: u64,
}

pub struct DeepLEngine {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepLEngine {
    /// `api_url` overrides the endpoint derived from the key type.
    pub fn new(api_key: impl Into<String>, api_url: Option<String>) -> Self {
        let api_key = api_key.into();
        let base_url = api_url
            .unwrap_or_else(|| default_api_url(&api_key).to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn auth_header(&self) -> String {
        format!("DeepL-Auth-Key {}", self.api_key)
    }
}

pub fn default_api_url(api_key: &str) -> &'static str {
    if api_key.ends_with(":fx") {
        DEEPL_FREE_API_URL
    } else {
        DEEPL_API_URL
    }
}

#[async_trait]
impl TranslationEngine for DeepLEngine {
    async fn translate(&self, request: EngineRequest) -> Result<Vec<String>> {
        let body = TranslateBody {
            text: &request.texts,
            source_lang: &request.source_lang,
            target_lang: &request.target_lang,
            tag_handling: request.tag_handling.map(|t| t.as_str()),
            glossary_id: request.glossary_id.as_deref(),
            formality: request.formality.as_deref(),
            preserve_formatting: request.preserve_formatting,
        };

        debug!(
            "DeepL translate {} -> {}: {} texts",
            request.source_lang,
            request.target_lang,
            request.texts.len()
        );

        let response = self
            .client
            .post(format!("{}/v2/translate", self.base_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        let parsed: TranslateResponse = response.json().await.map_err(|e| {
            LocalizeError::EngineFailure(format!("failed to parse DeepL response: {}", e))
        })?;

        Ok(parsed.translations.into_iter().map(|t| t.text).collect())
    }

    async fn usage(&self) -> Result<u64> {
        let response = self
            .client
            .get(format!("{}/v2/usage", self.base_url))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        let response = check_status(response).await?;
        let usage: UsageResponse = response.json().await.map_err(|e| {
            LocalizeError::EngineFailure(format!("failed to parse DeepL usage: {}", e))
        })?;
        Ok(usage.character_count)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
    let reason = match status.as_u16() {
        403 => "authorization failed",
        429 => "too many requests",
        456 => "quota exceeded",
        _ => "request failed",
    };
    Err(LocalizeError::EngineFailure(format!(
        "DeepL {} ({}): {}",
        reason, status, body
    )))
}


/// In-process engine for unit tests: upper-cases text outside markup and
/// records every call.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    pub(crate) struct MockEngine {
        calls: Mutex<Vec<EngineRequest>>,
        fail_on: Option<String>,
        limits: ChunkLimits,
        usage: u64,
    }

    impl MockEngine {
        pub(crate) fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: None,
                limits: ChunkLimits::deepl(),
                usage: 0,
            }
        }

        pub(crate) fn with_limits(mut self, limits: ChunkLimits) -> Self {
            self.limits = limits;
            self
        }

        /// Fail any call carrying a text that contains `needle`.
        pub(crate) fn failing_on(mut self, needle: &str) -> Self {
            self.fail_on = Some(needle.to_string());
            self
        }

        pub(crate) fn with_usage(mut self, usage: u64) -> Self {
            self.usage = usage;
            self
        }

        pub(crate) fn calls(&self) -> Vec<EngineRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    pub(crate) fn fake_translate(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut in_tag = false;
        let mut in_entity = false;
        for c in text.chars() {
            match c {
                '<' => in_tag = true,
                '>' => in_tag = false,
                '&' if !in_tag => in_entity = true,
                ';' if in_entity => in_entity = false,
                _ => {}
            }
            if in_tag || in_entity || c == '>' || c == ';' {
                out.push(c);
            } else {
                out.extend(c.to_uppercase());
            }
        }
        out
    }

    #[async_trait]
    impl TranslationEngine for MockEngine {
        async fn translate(&self, request: EngineRequest) -> Result<Vec<String>> {
            self.calls.lock().unwrap().push(request.clone());
            if let Some(needle) = &self.fail_on {
                if request.texts.iter().any(|t| t.contains(needle.as_str())) {
                    return Err(LocalizeError::EngineFailure(format!(
                        "mock failure on '{}'",
                        needle
                    )));
                }
            }
            Ok(request.texts.iter().map(|t| fake_translate(t)).collect())
        }

        async fn usage(&self) -> Result<u64> {
            Ok(self.usage)
        }

        fn limits(&self) -> ChunkLimits {
            self.limits
        }
    }
}
