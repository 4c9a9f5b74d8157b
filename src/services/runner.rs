use std::time::{Duration, Instant};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::job_queries;
use crate::models::job::JobType;
use crate::models::summary::SyncSummary;
use crate::services::translator::TranslationProvider;
use crate::services::{discovery, processor};

/// Read-only configuration snapshot for one sync invocation. Built once at
/// the entry point and passed down explicitly; the run never reads ambient
/// state.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Feature flag gating the whole mechanism.
    pub translations_enabled: bool,
    /// Whether the translation provider has credentials.
    pub provider_configured: bool,
    /// Target locales, excluding the base locale.
    pub enabled_locales: Vec<String>,
    /// Wall-clock budget for the invocation.
    pub time_budget: Duration,
    /// Due jobs claimed (and thus batch size) per cycle.
    pub batch_size: i64,
    /// Jobs discovery may enqueue per cycle, split across content types.
    pub discovery_quota: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            translations_enabled: true,
            provider_configured: false,
            enabled_locales: Vec::new(),
            time_budget: Duration::from_secs(50),
            batch_size: processor::DEFAULT_BATCH_SIZE,
            discovery_quota: 200,
        }
    }
}

/// Top-level failures that abort an invocation. Per-job problems never reach
/// this type; they become retry transitions inside the loop.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("job store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// An aborted invocation still reports the counters accumulated before the
/// failure.
#[derive(Debug)]
pub struct SyncAborted {
    pub summary: SyncSummary,
    pub error: SyncError,
}

/// Run one sync invocation: process due jobs while any exist, discover new
/// work when none do, and stop at the time budget or when idle.
///
/// The run is stateless and re-entrant; every step persists before the next
/// begins, so overlapping or interrupted invocations converge through the
/// job store. Precondition failures return a "skipped" summary, not an
/// error.
pub async fn run_sync(
    pool: &SqlitePool,
    provider: &dyn TranslationProvider,
    options: &SyncOptions,
) -> Result<SyncSummary, SyncAborted> {
    if !options.translations_enabled {
        return Ok(SyncSummary::skipped("automatic translations are disabled"));
    }
    if !options.provider_configured {
        return Ok(SyncSummary::skipped("translation provider is not configured"));
    }
    if options.enabled_locales.is_empty() {
        return Ok(SyncSummary::skipped("no enabled locales"));
    }

    let started = Instant::now();
    let deadline = started + options.time_budget;
    let mut summary = SyncSummary::completed_run();

    match run_loop(pool, provider, options, deadline, &mut summary).await {
        Ok(()) => {
            record_metrics(&summary, started.elapsed());
            tracing::info!(
                scanned = summary.scanned,
                completed = summary.completed,
                retried = summary.retried,
                failed = summary.failed,
                skipped_manual = summary.skipped_manual,
                skipped_up_to_date = summary.skipped_up_to_date,
                enqueued_event_jobs = summary.enqueued_event_jobs,
                enqueued_tag_jobs = summary.enqueued_tag_jobs,
                time_limit_reached = summary.time_limit_reached,
                "sync run finished"
            );
            Ok(summary)
        }
        Err(error) => {
            record_metrics(&summary, started.elapsed());
            tracing::error!(error = %error, "sync run aborted");
            Err(SyncAborted { summary, error })
        }
    }
}

async fn run_loop(
    pool: &SqlitePool,
    provider: &dyn TranslationProvider,
    options: &SyncOptions,
    deadline: Instant,
    summary: &mut SyncSummary,
) -> Result<(), SyncError> {
    loop {
        if Instant::now() >= deadline {
            summary.time_limit_reached = true;
            break;
        }

        let due = job_queries::fetch_due(pool, Utc::now(), options.batch_size).await?;

        if due.is_empty() {
            // Split the quota evenly so one content type cannot starve the
            // other.
            let per_type = options.discovery_quota / 2;
            let events = discovery::scan_content(
                pool,
                JobType::EventTitle,
                &options.enabled_locales,
                per_type,
                deadline,
            )
            .await?;
            let tags = discovery::scan_content(
                pool,
                JobType::TagName,
                &options.enabled_locales,
                per_type,
                deadline,
            )
            .await?;

            summary.scanned += events.scanned + tags.scanned;
            summary.enqueued_event_jobs += events.enqueued;
            summary.enqueued_tag_jobs += tags.enqueued;

            if events.enqueued == 0 && tags.enqueued == 0 {
                // Nothing due and nothing new: the corpus is in sync.
                break;
            }
            continue;
        }

        let outcome = processor::process_batch(pool, provider, due, deadline).await?;
        summary.completed += outcome.completed;
        summary.retried += outcome.retried;
        summary.failed += outcome.failed;
        summary.skipped_manual += outcome.skipped_manual;
        summary.skipped_up_to_date += outcome.skipped_up_to_date;
        for failure in outcome.errors {
            summary.record_failure(failure);
        }

        if outcome.deadline_hit {
            summary.time_limit_reached = true;
            break;
        }
    }

    Ok(())
}

fn record_metrics(summary: &SyncSummary, elapsed: Duration) {
    metrics::counter!("translation_jobs_completed_total").increment(summary.completed);
    metrics::counter!("translation_jobs_retried_total").increment(summary.retried);
    metrics::counter!("translation_jobs_failed_total").increment(summary.failed);
    metrics::counter!("translation_jobs_enqueued_total")
        .increment(summary.enqueued_event_jobs + summary.enqueued_tag_jobs);
    metrics::histogram!("translation_sync_run_seconds").record(elapsed.as_secs_f64());
}
