//! Re-propagation of changed entries recorded as change markers.

use crate::entry::{Entry, TranslatableField};
use crate::error::{LocalizeError, Result};
use crate::limiter::Priority;
use crate::prepare::Preparer;
use crate::reconcile::translated_values;
use crate::store::{ChangeMarker, EntryStore, MarkerId};
use crate::translate::Translator;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of one [`BatchReconciler::reconcile`] run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Markers whose whole group was updated; these markers are deleted
    pub processed: Vec<MarkerId>,
    /// Markers that no longer existed
    pub skipped: Vec<MarkerId>,
    /// Markers left in place for the next run
    pub failed: Vec<(MarkerId, LocalizeError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct BatchReconciler {
    translator: Arc<Translator>,
    store: Arc<dyn EntryStore>,
    preparer: Arc<Preparer>,
}

impl BatchReconciler {
    pub fn new(
        translator: Arc<Translator>,
        store: Arc<dyn EntryStore>,
        preparer: Arc<Preparer>,
    ) -> Self {
        Self {
            translator,
            store,
            preparer,
        }
    }

    /// Re-translate every group named by `marker_ids` from `source_locale`.
    ///
    /// A failing marker does not stop the run; it is reported and kept so the
    /// group is retried as a whole next time.
    pub async fn reconcile(&self, marker_ids: &[MarkerId], source_locale: &str) -> BatchReport {
        let mut report = BatchReport::default();
        for &id in marker_ids {
            match self.reconcile_marker(id, source_locale).await {
                Ok(true) => report.processed.push(id),
                Ok(false) => report.skipped.push(id),
                Err(e) => {
                    error!("Reconciling change marker {} failed: {}", id, e);
                    report.failed.push((id, e));
                }
            }
        }
        info!(
            "Batch reconciliation finished: {} processed, {} skipped, {} failed",
            report.processed.len(),
            report.skipped.len(),
            report.failed.len()
        );
        report
    }

    /// Returns `Ok(false)` when the marker no longer exists.
    pub async fn reconcile_marker(&self, id: MarkerId, source_locale: &str) -> Result<bool> {
        let Some(marker) = self.store.find_change_marker(id).await? else {
            debug!("Change marker {} not found, skipping", id);
            return Ok(false);
        };

        let group = self.load_group(&marker).await?;
        let Some(origin) = group.iter().find(|e| e.locale == source_locale) else {
            return Err(LocalizeError::MissingSourceSibling {
                group: marker.group_id.clone(),
                locale: source_locale.to_string(),
            });
        };

        let schema = self.preparer.schema();
        let fields = schema.translatable_fields(&marker.content_type, &origin.fields)?;

        for sibling in group.iter().filter(|e| e.id != origin.id) {
            self.update_sibling(&marker.content_type, origin, sibling, &fields)
                .await?;
        }

        self.store.delete_change_marker(id).await?;
        info!(
            "Reconciled group {} ({} siblings) from {}",
            marker.group_id,
            group.len() - 1,
            source_locale
        );
        Ok(true)
    }

    /// Source entry of the marker followed by every localization that
    /// still exists.
    async fn load_group(&self, marker: &ChangeMarker) -> Result<Vec<Entry>> {
        let source_id = marker.source_id().ok_or_else(|| {
            LocalizeError::InvalidRequest(format!("malformed group id '{}'", marker.group_id))
        })?;
        let source = self
            .store
            .find_entry(&marker.content_type, source_id)
            .await?
            .ok_or_else(|| LocalizeError::EntryNotFound {
                content_type: marker.content_type.clone(),
                id: source_id,
            })?;

        let mut group = Vec::with_capacity(source.localizations.len() + 1);
        for localization in &source.localizations {
            if let Some(entry) = self
                .store
                .find_entry(&marker.content_type, localization.id)
                .await?
            {
                group.push(entry);
            }
        }
        group.insert(0, source);
        Ok(group)
    }

    async fn update_sibling(
        &self,
        content_type: &str,
        origin: &Entry,
        sibling: &Entry,
        fields: &[TranslatableField],
    ) -> Result<()> {
        let mut translated = self
            .translator
            .translate(
                origin,
                &origin.locale,
                &sibling.locale,
                fields,
                Priority::BATCH_UPDATE,
            )
            .await?;

        let uid_paths = self
            .preparer
            .update_uids(content_type, &mut translated.fields, Some(sibling.id))
            .await?;
        let schema = self.preparer.schema();
        schema.remove_deleted_fields(content_type, &mut translated.fields)?;
        schema.sanitize(content_type, &mut translated.fields)?;

        let mut updates = translated_values(&translated, fields);
        for path in uid_paths {
            if let Some(value) = translated.get(&path) {
                updates.push((path.clone(), value.clone()));
            }
        }

        self.store
            .update_fields(content_type, sibling.id, updates)
            .await?;
        debug!(
            "Updated {} entry {} ({}) from {}",
            content_type, sibling.id, sibling.locale, origin.id
        );
        Ok(())
    }
}
