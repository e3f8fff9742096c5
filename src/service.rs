//! Entry point bundling the pipeline stages behind one value.

use crate::batch::{BatchReconciler, BatchReport};
use crate::dispatcher::Dispatcher;
use crate::entry::{Entry, EntryId, TranslatableField};
use crate::error::{LocalizeError, Result};
use crate::jobs::{Job, JobId, JobManager, JobParams};
use crate::limiter::Priority;
use crate::prepare::Preparer;
use crate::reconcile::Reconciler;
use crate::schema::Schema;
use crate::store::{EntryStore, LocaleDirectory, MarkerId};
use crate::translate::{estimate_usage, Translator};
use std::sync::Arc;
use tracing::info;

pub struct LocalizationService {
    store: Arc<dyn EntryStore>,
    schema: Arc<Schema>,
    translator: Arc<Translator>,
    reconciler: Reconciler,
    batch: BatchReconciler,
    jobs: Option<Arc<dyn JobManager>>,
}

impl LocalizationService {
    pub fn new(
        dispatcher: Dispatcher,
        store: Arc<dyn EntryStore>,
        locales: Arc<dyn LocaleDirectory>,
        schema: Arc<Schema>,
        regenerate_uids: bool,
    ) -> Self {
        let translator = Arc::new(Translator::new(Arc::new(dispatcher)));
        let preparer = Arc::new(Preparer::new(
            store.clone(),
            schema.clone(),
            regenerate_uids,
        ));
        let reconciler = Reconciler::new(
            translator.clone(),
            store.clone(),
            locales,
            preparer.clone(),
        );
        let batch = BatchReconciler::new(translator.clone(), store.clone(), preparer);

        Self {
            store,
            schema,
            translator,
            reconciler,
            batch,
            jobs: None,
        }
    }

    pub fn with_job_manager(mut self, jobs: Arc<dyn JobManager>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub async fn translate(
        &self,
        entry: &Entry,
        source: &str,
        target: &str,
        fields: &[TranslatableField],
        priority: Priority,
    ) -> Result<Entry> {
        self.translator
            .translate(entry, source, target, fields, priority)
            .await
    }

    pub fn estimate_usage(&self, entry: &Entry, fields: &[TranslatableField]) -> Result<usize> {
        estimate_usage(entry, fields)
    }

    /// Characters consumed on the engine account.
    pub async fn usage(&self) -> Result<u64> {
        self.translator.dispatcher().usage().await
    }

    pub async fn propagate(
        &self,
        source: &Entry,
        fields: &[TranslatableField],
        content_type: &str,
    ) -> Result<Entry> {
        self.reconciler.propagate(source, fields, content_type).await
    }

    /// Propagate every translatable field of a stored entry.
    pub async fn propagate_entry(&self, content_type: &str, id: EntryId) -> Result<Entry> {
        let source = self
            .store
            .find_entry(content_type, id)
            .await?
            .ok_or_else(|| LocalizeError::EntryNotFound {
                content_type: content_type.to_string(),
                id,
            })?;
        let fields = self.schema.translatable_fields(content_type, &source.fields)?;
        info!(
            "Propagating {} entry {} ({}) with {} translatable fields",
            content_type,
            id,
            source.locale,
            fields.len()
        );
        self.reconciler
            .propagate(&source, &fields, content_type)
            .await
    }

    pub async fn reconcile(&self, marker_ids: &[MarkerId], source_locale: &str) -> BatchReport {
        self.batch.reconcile(marker_ids, source_locale).await
    }

    pub async fn batch_translate(&self, params: JobParams) -> Result<Job> {
        self.job_manager()?.submit_job(params).await
    }

    pub async fn pause_job(&self, id: JobId) -> Result<Job> {
        self.job_manager()?.pause_job(id).await
    }

    pub async fn resume_job(&self, id: JobId) -> Result<Job> {
        self.job_manager()?.resume_job(id).await
    }

    pub async fn cancel_job(&self, id: JobId) -> Result<Job> {
        self.job_manager()?.cancel_job(id).await
    }

    fn job_manager(&self) -> Result<&dyn JobManager> {
        self.jobs
            .as_deref()
            .ok_or_else(|| LocalizeError::InvalidRequest("no job manager configured".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::MockEngine;
    use crate::jobs::JobStatus;
    use crate::limiter::RateLimiter;
    use crate::store::{Locale, MemoryStore, Snapshot};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    const CT: &str = "api::page.page";

    #[derive(Default)]
    struct RecordingJobs {
        commands: Mutex<Vec<String>>,
    }

    impl RecordingJobs {
        fn job(&self, command: &str, id: JobId, status: JobStatus) -> Job {
            self.commands.lock().unwrap().push(format!("{} {}", command, id));
            Job {
                id,
                params: JobParams {
                    content_type: CT.to_string(),
                    source_locale: "en".to_string(),
                    target_locale: "de".to_string(),
                    entity_ids: None,
                    auto_publish: false,
                },
                status,
            }
        }
    }

    #[async_trait]
    impl JobManager for RecordingJobs {
        async fn submit_job(&self, params: JobParams) -> Result<Job> {
            let mut job = self.job("submit", 1, JobStatus::Created);
            job.params = params;
            Ok(job)
        }

        async fn pause_job(&self, id: JobId) -> Result<Job> {
            Ok(self.job("pause", id, JobStatus::Paused))
        }

        async fn resume_job(&self, id: JobId) -> Result<Job> {
            Ok(self.job("resume", id, JobStatus::Running))
        }

        async fn cancel_job(&self, id: JobId) -> Result<Job> {
            Ok(self.job("cancel", id, JobStatus::Cancelled))
        }
    }

    fn service(engine: MockEngine) -> (Arc<MemoryStore>, LocalizationService) {
        let schema: Schema = serde_json::from_value(json!({
            "contentTypes": {
                "api::page.page": {
                    "attributes": {
                        "title": {"type": "string"},
                        "body": {"type": "richtext"},
                        "order": {"type": "integer", "localized": false}
                    }
                }
            }
        }))
        .unwrap();
        let store = Arc::new(MemoryStore::new(Snapshot {
            schema: schema.clone(),
            locales: vec![Locale::new("en"), Locale::new("de")],
            entries: BTreeMap::from([(
                CT.to_string(),
                vec![Entry::new(1, "en")
                    .with_field("title", json!("Welcome"))
                    .with_field("body", json!("Read **this**"))
                    .with_field("order", json!(2))],
            )]),
            markers: Vec::new(),
        }));
        let dispatcher = Dispatcher::new(Arc::new(engine), RateLimiter::new(5, Duration::ZERO));
        let service = LocalizationService::new(
            dispatcher,
            store.clone(),
            store.clone(),
            Arc::new(schema),
            false,
        );
        (store, service)
    }

    #[tokio::test]
    async fn test_propagate_entry_uses_schema_fields() {
        let (store, service) = service(MockEngine::new());

        let source = service.propagate_entry(CT, 1).await.unwrap();

        assert_eq!(source.localizations.len(), 1);
        let sibling = store
            .find_entry(CT, source.localizations[0].id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sibling.locale, "de");
        assert_eq!(sibling.fields["title"], json!("WELCOME"));
        assert_eq!(sibling.fields["body"], json!("READ **THIS**"));
        assert_eq!(sibling.fields["order"], json!(2));
    }

    #[tokio::test]
    async fn test_propagate_missing_entry() {
        let (_store, service) = service(MockEngine::new());
        let err = service.propagate_entry(CT, 9).await.unwrap_err();
        assert!(matches!(err, LocalizeError::EntryNotFound { id: 9, .. }));
    }

    #[tokio::test]
    async fn test_usage_and_estimate() {
        let (store, service) = service(MockEngine::new().with_usage(1234));
        assert_eq!(service.usage().await.unwrap(), 1234);

        let entry = store.find_entry(CT, 1).await.unwrap().unwrap();
        let fields = service
            .schema()
            .translatable_fields(CT, &entry.fields)
            .unwrap();
        // "Welcome" plus the markup form of the markdown body
        let expected = "Welcome".len() + "<p>Read <strong>this</strong></p>\n".len();
        assert_eq!(service.estimate_usage(&entry, &fields).unwrap(), expected);
    }

    #[tokio::test]
    async fn test_job_commands_are_delegated() {
        let jobs = Arc::new(RecordingJobs::default());
        let (_store, service) = service(MockEngine::new());
        let service = service.with_job_manager(jobs.clone());

        let params = JobParams {
            content_type: CT.to_string(),
            source_locale: "en".to_string(),
            target_locale: "de".to_string(),
            entity_ids: Some(vec![1]),
            auto_publish: true,
        };
        let job = service.batch_translate(params.clone()).await.unwrap();
        assert_eq!(job.params, params);
        assert_eq!(service.pause_job(1).await.unwrap().status, JobStatus::Paused);
        assert_eq!(service.resume_job(1).await.unwrap().status, JobStatus::Running);
        assert_eq!(
            service.cancel_job(1).await.unwrap().status,
            JobStatus::Cancelled
        );
        assert_eq!(
            *jobs.commands.lock().unwrap(),
            vec!["submit 1", "pause 1", "resume 1", "cancel 1"]
        );
    }

    #[tokio::test]
    async fn test_jobs_without_manager() {
        let (_store, service) = service(MockEngine::new());
        let err = service.pause_job(1).await.unwrap_err();
        assert!(matches!(err, LocalizeError::InvalidRequest(_)));
    }
}
