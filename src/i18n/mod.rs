//! Internationalization (i18n) support for the translation engine.
//!
//! # Architecture
//!
//! - `registry`: languages the engine accepts and their regional variants
//! - `resolver`: internal locale code -> engine code, per direction
//! - `glossary`: terminology glossaries keyed by engine language pair
//! - `validator`: markup preservation checks on translated results
//! - `metrics`: dispatch counters
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::i18n::{resolve_locale, LocaleDirection, LocaleMap};
//!
//! let target = resolve_locale("en", &LocaleMap::new(), LocaleDirection::Target)?;
//! assert_eq!(target, "EN-US");
//! ```

mod glossary;
mod metrics;
mod registry;
mod resolver;
mod validator;

pub use glossary::{select_glossary, Glossary};
pub use metrics::{DispatchMetrics, MetricsReport};
pub use registry::{EngineLanguage, LanguageRegistry};
pub use resolver::{resolve_locale, LocaleDirection, LocaleMap, LocaleOverride};
pub use validator::{TranslationValidator, ValidationReport};
