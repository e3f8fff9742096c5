//! Engine language registry: the languages the translation engine accepts.
//!
//! Uses a singleton with `OnceLock`; the table mirrors DeepL's published
//! source and target language lists.

use std::sync::OnceLock;

/// A language supported by the engine.
#[derive(Debug, Clone)]
pub struct EngineLanguage {
    /// Generic engine code, upper-case (e.g. "DE", "EN")
    pub code: &'static str,

    /// English name of the language
    pub name: &'static str,

    /// Region-qualified codes accepted as target (e.g. "EN-GB")
    pub target_variants: &'static [&'static str],

    /// Variant used when the engine refuses the generic code as target
    pub default_target: Option<&'static str>,
}

impl EngineLanguage {
    /// Whether the generic code is rejected as a target language.
    pub fn requires_target_region(&self) -> bool {
        self.default_target.is_some()
    }
}

pub struct LanguageRegistry {
    languages: Vec<EngineLanguage>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: engine_languages(),
        })
    }

    /// Look up a language by its generic code (case-insensitive).
    pub fn get_by_code(&self, code: &str) -> Option<&EngineLanguage> {
        self.languages
            .iter()
            .find(|lang| lang.code.eq_ignore_ascii_case(code))
    }

    pub fn is_supported(&self, code: &str) -> bool {
        self.get_by_code(code).is_some()
    }
}

fn lang(code: &'static str, name: &'static str) -> EngineLanguage {
    EngineLanguage {
        code,
        name,
        target_variants: &[],
        default_target: None,
    }
}

fn engine_languages() -> Vec<EngineLanguage> {
    vec![
        lang("AR", "Arabic"),
        lang("BG", "Bulgarian"),
        lang("CS", "Czech"),
        lang("DA", "Danish"),
        lang("DE", "German"),
        lang("EL", "Greek"),
        EngineLanguage {
            code: "EN",
            name: "English",
            target_variants: &["EN-GB", "EN-US"],
            default_target: Some("EN-US"),
        },
        EngineLanguage {
            code: "ES",
            name: "Spanish",
            target_variants: &["ES-419"],
            default_target: None,
        },
        lang("ET", "Estonian"),
        lang("FI", "Finnish"),
        lang("FR", "French"),
        lang("HU", "Hungarian"),
        lang("ID", "Indonesian"),
        lang("IT", "Italian"),
        lang("JA", "Japanese"),
        lang("KO", "Korean"),
        lang("LT", "Lithuanian"),
        lang("LV", "Latvian"),
        lang("NB", "Norwegian Bokmål"),
        lang("NL", "Dutch"),
        lang("PL", "Polish"),
        EngineLanguage {
            code: "PT",
            name: "Portuguese",
            target_variants: &["PT-BR", "PT-PT"],
            default_target: Some("PT-PT"),
        },
        lang("RO", "Romanian"),
        lang("RU", "Russian"),
        lang("SK", "Slovak"),
        lang("SL", "Slovenian"),
        lang("SV", "Swedish"),
        lang("TR", "Turkish"),
        lang("UK", "Ukrainian"),
        EngineLanguage {
            code: "ZH",
            name: "Chinese",
            target_variants: &["ZH-HANS", "ZH-HANT"],
            default_target: None,
        },
    ]
}
