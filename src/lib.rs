//! Content localization pipeline.
//!
//! Translatable fields of a structured entry are grouped by format,
//! converted to markup, split into engine-sized chunks and sent through a
//! shared rate-limited gate to DeepL. The results are written into sibling
//! entries of every configured locale and the localization graph is kept
//! closed.

pub mod batch;
pub mod chunk;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod entry;
pub mod error;
pub mod format;
pub mod i18n;
pub mod jobs;
pub mod limiter;
pub mod path;
pub mod prepare;
pub mod reconcile;
pub mod schema;
pub mod service;
pub mod store;
pub mod translate;

pub use error::{LocalizeError, Result};
pub use service::LocalizationService;
