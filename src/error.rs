//! Error taxonomy for the localization pipeline.
//!
//! Binaries and configuration loading use `anyhow`; everything reachable
//! from a translate or reconcile call returns [`LocalizeError`] so callers
//! can tell which stage failed.

use crate::entry::{EntryId, FieldFormat};
use crate::i18n::LocaleDirection;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LocalizeError>;

#[derive(Debug, Error)]
pub enum LocalizeError {
    /// The request cannot be sent at all (e.g. a locale is missing)
    #[error("invalid translation request: {0}")]
    InvalidRequest(String),

    #[error("unsupported {direction} locale '{code}'")]
    UnsupportedLocale {
        code: String,
        direction: LocaleDirection,
    },

    #[error("failed to convert {format} content: {message}")]
    Conversion { format: FieldFormat, message: String },

    /// Network, quota or provider error on a chunk call
    #[error("translation engine failure: {0}")]
    EngineFailure(String),

    #[error("no entry with locale '{locale}' in localization group {group}")]
    MissingSourceSibling { group: String, locale: String },

    #[error("{content_type} entry {id} not found")]
    EntryNotFound { content_type: String, id: EntryId },

    #[error("unknown content type '{0}'")]
    UnknownContentType(String),

    #[error("store error: {0}")]
    Store(String),
}

impl LocalizeError {
    pub(crate) fn conversion(format: FieldFormat, message: impl Into<String>) -> Self {
        Self::Conversion {
            format,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for LocalizeError {
    fn from(error: reqwest::Error) -> Self {
        Self::EngineFailure(error.to_string())
    }
}
