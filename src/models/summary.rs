use serde::Serialize;
use uuid::Uuid;

use crate::models::job::JobType;

/// Cap on the error list carried in a run summary.
pub const MAX_REPORTED_ERRORS: usize = 25;

/// One per-job failure, collected for the run summary. A single job's
/// failure never aborts its siblings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub job_type: JobType,
    pub target_id: Option<Uuid>,
    pub locale: Option<String>,
    pub message: String,
}

/// Outcome of one sync invocation, returned as the trigger endpoint's JSON
/// body and printed by the one-shot binary.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub scanned: u64,
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
    pub skipped_manual: u64,
    pub skipped_up_to_date: u64,
    pub enqueued_event_jobs: u64,
    pub enqueued_tag_jobs: u64,
    pub time_limit_reached: bool,
    pub errors: Vec<JobFailure>,
}

impl SyncSummary {
    pub fn completed_run() -> Self {
        Self {
            status: "completed".to_string(),
            ..Self::default()
        }
    }

    pub fn skipped(reason: &str) -> Self {
        Self {
            status: "skipped".to_string(),
            skip_reason: Some(reason.to_string()),
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, failure: JobFailure) {
        if self.errors.len() < MAX_REPORTED_ERRORS {
            self.errors.push(failure);
        }
    }
}
