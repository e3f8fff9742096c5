//! Cross-locale reconciliation: push a source entry's translation into every
//! other configured locale, updating existing siblings or creating new ones
//! and keeping the localization graph closed.

use crate::entry::{Entry, EntryDraft, LocalizationRef, TranslatableField};
use crate::error::Result;
use crate::limiter::Priority;
use crate::path::FieldPath;
use crate::prepare::Preparer;
use crate::store::{EntryStore, LocaleDirectory};
use crate::translate::Translator;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// In-memory view of one localization group, owned by a single
/// [`Reconciler::propagate`] call.
#[derive(Debug, Clone)]
pub struct LocaleGroup {
    source: Entry,
}

impl LocaleGroup {
    pub fn new(source: Entry) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &Entry {
        &self.source
    }

    pub fn sibling(&self, locale: &str) -> Option<&LocalizationRef> {
        self.source.localization_for(locale)
    }

    /// Record a newly created sibling on the source.
    pub fn link(&mut self, sibling: LocalizationRef) {
        self.source.localizations.push(sibling);
    }

    /// Every entry of the group, source first.
    pub fn members(&self) -> Vec<LocalizationRef> {
        let mut members = vec![self.source.to_ref()];
        members.extend(self.source.localizations.iter().cloned());
        members
    }

    /// What `member` must list as its localizations: everyone but itself.
    pub fn localizations_of(&self, member: &LocalizationRef) -> Vec<LocalizationRef> {
        self.members()
            .into_iter()
            .filter(|other| other.id != member.id)
            .collect()
    }

    pub fn into_source(self) -> Entry {
        self.source
    }
}

pub struct Reconciler {
    translator: Arc<Translator>,
    store: Arc<dyn EntryStore>,
    locales: Arc<dyn LocaleDirectory>,
    preparer: Arc<Preparer>,
    priority: Priority,
}

impl Reconciler {
    pub fn new(
        translator: Arc<Translator>,
        store: Arc<dyn EntryStore>,
        locales: Arc<dyn LocaleDirectory>,
        preparer: Arc<Preparer>,
    ) -> Self {
        Self {
            translator,
            store,
            locales,
            preparer,
            priority: Priority::DIRECT_TRANSLATION,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Translate `fields` of `source` into every other configured locale.
    ///
    /// Locales are handled one after another since each step reads the
    /// graph the previous one wrote. The first failure aborts the remaining
    /// locales. Returns the source entry with its final localizations.
    pub async fn propagate(
        &self,
        source: &Entry,
        fields: &[TranslatableField],
        content_type: &str,
    ) -> Result<Entry> {
        let mut group = LocaleGroup::new(source.clone());
        let locales = self.locales.find().await?;

        for locale in locales.iter().filter(|l| l.code != source.locale) {
            let translated = self
                .translator
                .translate(
                    group.source(),
                    &source.locale,
                    &locale.code,
                    fields,
                    self.priority,
                )
                .await?;

            match group.sibling(&locale.code).cloned() {
                Some(existing) => {
                    let updates = translated_values(&translated, fields);
                    self.store
                        .update_fields(content_type, existing.id, updates)
                        .await?;
                    info!(
                        "Updated {} entry {} ({}) from {}",
                        content_type, existing.id, locale.code, source.id
                    );
                }
                None => {
                    let created = self
                        .create_sibling(&mut group, &translated, content_type, &locale.code)
                        .await?;
                    info!(
                        "Created {} entry {} ({}) from {}",
                        content_type, created.id, locale.code, source.id
                    );
                }
            }
        }

        Ok(group.into_source())
    }

    async fn create_sibling(
        &self,
        group: &mut LocaleGroup,
        translated: &Entry,
        content_type: &str,
        locale: &str,
    ) -> Result<Entry> {
        let fields = self
            .preparer
            .prepare_new(content_type, translated, locale)
            .await?;
        let created = self
            .store
            .create_entry(
                content_type,
                EntryDraft {
                    locale: locale.to_string(),
                    published_at: Some(Utc::now()),
                    fields,
                },
            )
            .await?;

        group.link(created.to_ref());
        self.store
            .set_localizations(
                content_type,
                group.source().id,
                group.source().localizations.clone(),
            )
            .await?;

        self.sync_localizations(group, content_type).await?;
        self.sync_non_localized_attributes(group, content_type)
            .await?;
        Ok(created)
    }

    /// Make every sibling list every other member of the group.
    async fn sync_localizations(&self, group: &LocaleGroup, content_type: &str) -> Result<()> {
        for member in group.members().iter().skip(1) {
            self.store
                .set_localizations(content_type, member.id, group.localizations_of(member))
                .await?;
        }
        Ok(())
    }

    /// Copy shared attribute values from the source onto every sibling.
    async fn sync_non_localized_attributes(
        &self,
        group: &LocaleGroup,
        content_type: &str,
    ) -> Result<()> {
        let shared = self
            .preparer
            .schema()
            .non_localized_attributes(content_type)?;
        let updates: Vec<(FieldPath, Value)> = shared
            .into_iter()
            .map(|name| {
                let value = group
                    .source()
                    .fields
                    .get(&name)
                    .cloned()
                    .unwrap_or(Value::Null);
                (FieldPath::key(name), value)
            })
            .collect();
        if updates.is_empty() {
            return Ok(());
        }

        for sibling in &group.source().localizations {
            debug!(
                "Syncing {} shared attributes onto {} entry {}",
                updates.len(),
                content_type,
                sibling.id
            );
            self.store
                .update_fields(content_type, sibling.id, updates.clone())
                .await?;
        }
        Ok(())
    }
}

/// The translated values of `fields`, ready for a partial write.
pub(crate) fn translated_values(
    translated: &Entry,
    fields: &[TranslatableField],
) -> Vec<(FieldPath, Value)> {
    fields
        .iter()
        .filter_map(|field| {
            translated
                .get(&field.path)
                .map(|value| (field.path.clone(), value.clone()))
        })
        .collect()
}
