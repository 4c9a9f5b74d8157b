use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{content_queries, job_queries};
use crate::models::job::{split_dedupe_key, JobPayload, JobType, TranslationJob};
use crate::models::summary::JobFailure;
use crate::models::translation::content_hash;
use crate::services::translator::{self, BatchItem, TranslationProvider};

/// Bound on claimed jobs, and therefore on batch-request size, per cycle.
pub const DEFAULT_BATCH_SIZE: i64 = 20;

/// Errors that stay inside one job's boundary. Each converts into
/// `schedule_retry_or_fail` and never aborts sibling jobs.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job payload is invalid: {0}")]
    InvalidPayload(String),

    #[error("source row {0} no longer exists")]
    SourceMissing(Uuid),

    #[error("translation batch failed: {0}")]
    BatchFailed(String),

    #[error("provider response had no entry for job {0}")]
    MissingBatchEntry(Uuid),

    #[error("persistence failed: {0}")]
    Persistence(#[source] sqlx::Error),
}

/// Counter deltas from one processing cycle.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub completed: u64,
    pub retried: u64,
    pub failed: u64,
    pub skipped_manual: u64,
    pub skipped_up_to_date: u64,
    pub errors: Vec<JobFailure>,
    /// Set when the deadline passed before every due job could be claimed.
    pub deadline_hit: bool,
}

enum Resolution {
    Translate {
        target_id: Uuid,
        locale: String,
        source_text: String,
        source_hash: String,
    },
    SkippedManual,
    SkippedUpToDate,
}

struct ResolvedJob {
    job: TranslationJob,
    job_type: JobType,
    target_id: Uuid,
    locale: String,
    source_text: String,
    source_hash: String,
}

/// Claim and process one batch of due jobs.
///
/// Claim races are silent no-ops. Jobs whose current translation is manual or
/// already hash-current complete without an external call. Everything else is
/// grouped into a single provider request; per-job failures reschedule just
/// that job, a whole-call failure reschedules all of them with the same
/// error. Errors returned from this function are top-level store failures,
/// not job outcomes.
pub async fn process_batch(
    pool: &SqlitePool,
    provider: &dyn TranslationProvider,
    due: Vec<TranslationJob>,
    deadline: Instant,
) -> Result<CycleOutcome, sqlx::Error> {
    let mut outcome = CycleOutcome::default();
    let mut to_translate: Vec<ResolvedJob> = Vec::new();

    for job in due {
        if Instant::now() >= deadline {
            // Unclaimed jobs stay pending for the next invocation.
            outcome.deadline_hit = true;
            break;
        }

        let now = Utc::now();
        let Some(claimed) = job_queries::claim(pool, job.id, now).await? else {
            tracing::debug!(job_id = %job.id, "lost claim race");
            continue;
        };

        match resolve_job(pool, &claimed).await {
            Ok(Resolution::Translate { target_id, locale, source_text, source_hash }) => {
                let job_type = claimed.job_type;
                to_translate.push(ResolvedJob {
                    job: claimed,
                    job_type,
                    target_id,
                    locale,
                    source_text,
                    source_hash,
                });
            }
            Ok(Resolution::SkippedManual) => outcome.skipped_manual += 1,
            Ok(Resolution::SkippedUpToDate) => outcome.skipped_up_to_date += 1,
            Err(err) => record_job_error(pool, &claimed, err, &mut outcome).await?,
        }
    }

    if to_translate.is_empty() {
        return Ok(outcome);
    }

    // One external call per cycle. Per-job calls would multiply latency and
    // cost by the batch size.
    let items: Vec<BatchItem> = to_translate
        .iter()
        .map(|resolved| BatchItem {
            id: resolved.job.id,
            source_text: resolved.source_text.clone(),
            source_label: resolved.job_type.source_label(),
            locale: resolved.locale.clone(),
            locale_label: translator::locale_label(&resolved.locale),
        })
        .collect();

    tracing::info!(batch_size = items.len(), "requesting batch translation");

    let by_id = match provider.translate_batch(&items).await {
        Ok(entries) => translator::index_translations(entries),
        Err(err) => {
            // Whole-call failure: every job in the batch reschedules with
            // the same error.
            let message = err.to_string();
            for resolved in &to_translate {
                record_job_error(
                    pool,
                    &resolved.job,
                    JobError::BatchFailed(message.clone()),
                    &mut outcome,
                )
                .await?;
            }
            return Ok(outcome);
        }
    };

    for resolved in to_translate {
        match by_id.get(&resolved.job.id) {
            Some(text) => match apply_translation(pool, &resolved, text).await {
                Ok(()) => {
                    outcome.completed += 1;
                    tracing::info!(
                        job_id = %resolved.job.id,
                        job_type = %resolved.job_type,
                        target_id = %resolved.target_id,
                        locale = %resolved.locale,
                        "translation persisted"
                    );
                }
                Err(err) => record_job_error(pool, &resolved.job, err, &mut outcome).await?,
            },
            None => {
                // Partial response: only the absent jobs reschedule.
                record_job_error(
                    pool,
                    &resolved.job,
                    JobError::MissingBatchEntry(resolved.job.id),
                    &mut outcome,
                )
                .await?
            }
        }
    }

    Ok(outcome)
}

/// Re-resolve a claimed job against live data. The payload snapshot may
/// predate source edits, so the current source text is always re-read and
/// re-hashed before deciding whether a translation call is needed.
async fn resolve_job(pool: &SqlitePool, job: &TranslationJob) -> Result<Resolution, JobError> {
    let (target_id, locale) = job_identity(job)?;
    let job_type = job.job_type;

    let source_text = content_queries::get_source_text(pool, job_type, target_id)
        .await
        .map_err(JobError::Persistence)?
        .ok_or(JobError::SourceMissing(target_id))?;
    let source_hash = content_hash(&source_text);

    let meta = content_queries::get_translation_meta(pool, job_type, target_id, &locale)
        .await
        .map_err(JobError::Persistence)?;

    if let Some(meta) = &meta {
        if meta.is_manual {
            complete_job(pool, job, target_id, &locale, &source_text, &source_hash).await?;
            return Ok(Resolution::SkippedManual);
        }
        if meta.source_hash.as_deref() == Some(source_hash.as_str()) {
            // A duplicate of work another cycle already finished.
            complete_job(pool, job, target_id, &locale, &source_text, &source_hash).await?;
            return Ok(Resolution::SkippedUpToDate);
        }
    }

    Ok(Resolution::Translate {
        target_id,
        locale,
        source_text,
        source_hash,
    })
}

/// Job identity from the payload, falling back to the dedupe key when the
/// payload is malformed. Only when both fail is the payload unrecoverable.
fn job_identity(job: &TranslationJob) -> Result<(Uuid, String), JobError> {
    match job.parse_payload() {
        Ok(payload) => Ok((payload.target_id(), payload.locale().to_string())),
        Err(parse_err) => split_dedupe_key(&job.dedupe_key)
            .ok_or_else(|| JobError::InvalidPayload(parse_err.to_string())),
    }
}

async fn apply_translation(
    pool: &SqlitePool,
    resolved: &ResolvedJob,
    text: &str,
) -> Result<(), JobError> {
    content_queries::upsert_translation(
        pool,
        resolved.job_type,
        resolved.target_id,
        &resolved.locale,
        text,
        &resolved.source_hash,
        Utc::now(),
    )
    .await
    .map_err(JobError::Persistence)?;

    complete_job(
        pool,
        &resolved.job,
        resolved.target_id,
        &resolved.locale,
        &resolved.source_text,
        &resolved.source_hash,
    )
    .await
}

/// Complete a job with a payload refreshed to the snapshot it was resolved
/// against, so later discovery passes can short-circuit on the hash.
async fn complete_job(
    pool: &SqlitePool,
    job: &TranslationJob,
    target_id: Uuid,
    locale: &str,
    source_text: &str,
    source_hash: &str,
) -> Result<(), JobError> {
    let final_payload = JobPayload::new(
        job.job_type,
        target_id,
        locale.to_string(),
        Some(source_text.to_string()),
        Some(source_hash.to_string()),
    );
    job_queries::complete(pool, job, &final_payload, Utc::now())
        .await
        .map_err(JobError::Persistence)
}

/// Convert a per-job error into a retry-or-fail transition and record it in
/// the cycle outcome. Store failures here are top-level: if the queue itself
/// cannot be written, the run cannot make progress.
async fn record_job_error(
    pool: &SqlitePool,
    job: &TranslationJob,
    err: JobError,
    outcome: &mut CycleOutcome,
) -> Result<(), sqlx::Error> {
    let message = err.to_string();
    let now: DateTime<Utc> = Utc::now();
    let terminal = job_queries::schedule_retry_or_fail(pool, job, &message, now).await?;

    if terminal {
        outcome.failed += 1;
        tracing::warn!(job_id = %job.id, job_type = %job.job_type, error = %message, "job failed terminally");
    } else {
        outcome.retried += 1;
        tracing::info!(job_id = %job.id, job_type = %job.job_type, error = %message, "job rescheduled");
    }

    let identity = job_identity(job).ok();
    outcome.errors.push(JobFailure {
        job_type: job.job_type,
        target_id: identity.as_ref().map(|(id, _)| *id),
        locale: identity.map(|(_, locale)| locale),
        message,
    });

    Ok(())
}
