//! Background batch-translation jobs.
//!
//! Scheduling and persistence of jobs belong to the host; the pipeline only
//! needs to hand work over and forward lifecycle commands.

use crate::entry::EntryId;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type JobId = i64;

/// Work description for translating many entries of one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobParams {
    pub content_type: String,
    pub source_locale: String,
    pub target_locale: String,
    /// Restrict the job to these source entries; all entries when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_ids: Option<Vec<EntryId>>,
    #[serde(default)]
    pub auto_publish: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Running,
    Paused,
    Finished,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: JobId,
    pub params: JobParams,
    pub status: JobStatus,
}

/// Lifecycle of long-running batch jobs.
///
/// Pausing or cancelling takes effect between units of work; a translation
/// already handed to the dispatcher runs to completion.
#[async_trait]
pub trait JobManager: Send + Sync {
    async fn submit_job(&self, params: JobParams) -> Result<Job>;

    async fn pause_job(&self, id: JobId) -> Result<Job>;

    async fn resume_job(&self, id: JobId) -> Result<Job>;

    async fn cancel_job(&self, id: JobId) -> Result<Job>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_wire_format() {
        let params: JobParams = serde_json::from_value(json!({
            "contentType": "api::article.article",
            "sourceLocale": "en",
            "targetLocale": "de",
            "entityIds": [1, 2]
        }))
        .unwrap();

        assert_eq!(params.entity_ids, Some(vec![1, 2]));
        assert!(!params.auto_publish);

        let job = Job {
            id: 4,
            params,
            status: JobStatus::Paused,
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], json!("paused"));
        assert_eq!(value["params"]["targetLocale"], json!("de"));
    }

    #[test]
    fn test_params_without_entity_ids() {
        let params: JobParams = serde_json::from_value(json!({
            "contentType": "api::article.article",
            "sourceLocale": "en",
            "targetLocale": "fr",
            "autoPublish": true
        }))
        .unwrap();
        assert_eq!(params.entity_ids, None);
        assert!(params.auto_publish);
        assert!(!serde_json::to_value(&params)
            .unwrap()
            .as_object()
            .unwrap()
            .contains_key("entityIds"));
    }
}
