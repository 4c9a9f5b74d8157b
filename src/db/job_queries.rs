use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, SqlitePool};
use uuid::Uuid;

use crate::db::decode_uuid;
use crate::models::job::{JobPayload, JobStatus, JobType, TranslationJob};

/// Rows per chunk when persisting discovered jobs.
const UPSERT_CHUNK: usize = 200;

/// Default attempt ceiling for newly discovered jobs.
const DEFAULT_MAX_ATTEMPTS: i64 = 5;

/// Stored error messages are truncated to this many characters.
const MAX_ERROR_LEN: usize = 1000;

/// A `processing` claim older than this belongs to a crashed invocation and
/// becomes claimable again.
pub const STALE_CLAIM_SECS: i64 = 900;

/// A job candidate produced by discovery, not yet persisted.
#[derive(Debug, Clone)]
pub struct DiscoveredJob {
    pub job_type: JobType,
    pub dedupe_key: String,
    pub payload: JobPayload,
}

/// Persist discovered job candidates, chunked.
///
/// Per (job_type, dedupe_key): insert when absent; leave pending/processing
/// rows alone (another cycle owns them); overwrite completed rows (the source
/// may have drifted); overwrite failed rows only when the candidate's source
/// hash differs, so an unchanging failure cannot hot-loop back into the queue.
/// Returns the number of rows actually created or revived.
pub async fn upsert_discovered(
    pool: &SqlitePool,
    rows: &[DiscoveredJob],
    now: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let mut enqueued = 0u64;
    let now_s = now.timestamp();

    for chunk in rows.chunks(UPSERT_CHUNK) {
        let mut qb = QueryBuilder::new(
            "INSERT INTO translation_jobs \
             (id, job_type, dedupe_key, payload, status, attempts, max_attempts, \
              available_at, reserved_at, last_error, created_at, updated_at) ",
        );
        qb.push_values(chunk, |mut b, row| {
            b.push_bind(Uuid::new_v4().to_string())
                .push_bind(row.job_type.to_string())
                .push_bind(row.dedupe_key.as_str())
                .push_bind(sqlx::types::Json(&row.payload))
                .push_bind("pending")
                .push_bind(0i64)
                .push_bind(DEFAULT_MAX_ATTEMPTS)
                .push_bind(now_s)
                .push_bind(Option::<i64>::None)
                .push_bind(Option::<String>::None)
                .push_bind(now_s)
                .push_bind(now_s);
        });
        qb.push(
            " ON CONFLICT(job_type, dedupe_key) DO UPDATE SET \
               payload = excluded.payload, \
               status = 'pending', \
               attempts = 0, \
               available_at = excluded.available_at, \
               reserved_at = NULL, \
               last_error = NULL, \
               updated_at = excluded.updated_at \
             WHERE translation_jobs.status = 'completed' \
                OR (translation_jobs.status = 'failed' \
                    AND json_extract(translation_jobs.payload, '$.source_hash') \
                        IS NOT json_extract(excluded.payload, '$.source_hash'))",
        );

        let result = qb.build().execute(pool).await?;
        enqueued += result.rows_affected();
    }

    Ok(enqueued)
}

/// Fetch jobs eligible for claiming, earliest-available first.
///
/// Besides due pending jobs, this also surfaces `processing` rows whose claim
/// is older than [`STALE_CLAIM_SECS`], so a crash between claim and
/// resolution self-heals on a later invocation.
pub async fn fetch_due(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<TranslationJob>, sqlx::Error> {
    let now_s = now.timestamp();
    let rows = sqlx::query(
        r#"
        SELECT id, job_type, dedupe_key, payload, status, attempts, max_attempts,
               available_at, reserved_at, last_error
        FROM translation_jobs
        WHERE (status = 'pending' AND available_at <= ?)
           OR (status = 'processing' AND reserved_at IS NOT NULL AND reserved_at <= ?)
        ORDER BY available_at ASC, id ASC
        LIMIT ?
        "#,
    )
    .bind(now_s)
    .bind(now_s - STALE_CLAIM_SECS)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Atomically claim a job. A single conditional update is the only
/// concurrency guard: of any number of racing claimers, exactly one gets the
/// row back and the rest get `None`, which is an expected outcome and not an
/// error.
pub async fn claim(
    pool: &SqlitePool,
    job_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<TranslationJob>, sqlx::Error> {
    let now_s = now.timestamp();
    let row = sqlx::query(
        r#"
        UPDATE translation_jobs
        SET status = 'processing', reserved_at = ?, updated_at = ?
        WHERE id = ?
          AND ((status = 'pending' AND available_at <= ?)
               OR (status = 'processing' AND reserved_at IS NOT NULL AND reserved_at <= ?))
        RETURNING id, job_type, dedupe_key, payload, status, attempts, max_attempts,
                  available_at, reserved_at, last_error
        "#,
    )
    .bind(now_s)
    .bind(now_s)
    .bind(job_id.to_string())
    .bind(now_s)
    .bind(now_s - STALE_CLAIM_SECS)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Mark a job completed. The payload is refreshed with the snapshot the job
/// was completed against so a later discovery pass can short-circuit on hash.
pub async fn complete(
    pool: &SqlitePool,
    job: &TranslationJob,
    final_payload: &JobPayload,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE translation_jobs
        SET status = 'completed', attempts = attempts + 1, last_error = NULL,
            payload = ?, reserved_at = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(sqlx::types::Json(final_payload))
    .bind(now.timestamp())
    .bind(job.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a per-job failure: bump attempts, then either reschedule with
/// backoff or, at the attempt ceiling, fail terminally with an immediate
/// `available_at` so operators see it right away. Returns whether the
/// failure was terminal.
pub async fn schedule_retry_or_fail(
    pool: &SqlitePool,
    job: &TranslationJob,
    error: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let next_attempt = job.attempts + 1;
    let terminal = next_attempt >= job.max_attempts;
    let available_at = if terminal {
        now.timestamp()
    } else {
        now.timestamp() + backoff_secs(next_attempt)
    };
    let status = if terminal { "failed" } else { "pending" };

    sqlx::query(
        r#"
        UPDATE translation_jobs
        SET status = ?, attempts = ?, last_error = ?, available_at = ?,
            reserved_at = NULL, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status)
    .bind(next_attempt)
    .bind(truncate_error(error))
    .bind(available_at)
    .bind(now.timestamp())
    .bind(job.id.to_string())
    .execute(pool)
    .await?;

    Ok(terminal)
}

/// Get a job by ID
pub async fn get_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<TranslationJob>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, job_type, dedupe_key, payload, status, attempts, max_attempts,
               available_at, reserved_at, last_error
        FROM translation_jobs
        WHERE id = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Look a job up by its uniqueness key.
pub async fn find_by_dedupe(
    pool: &SqlitePool,
    job_type: JobType,
    dedupe_key: &str,
) -> Result<Option<TranslationJob>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT id, job_type, dedupe_key, payload, status, attempts, max_attempts,
               available_at, reserved_at, last_error
        FROM translation_jobs
        WHERE job_type = ? AND dedupe_key = ?
        "#,
    )
    .bind(job_type.to_string())
    .bind(dedupe_key)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// Retry delay in seconds for the given attempt number: exponential, floored
/// at 2s, capped at one hour.
pub fn backoff_secs(attempt: i64) -> i64 {
    let exp = attempt.clamp(1, 12) as u32;
    (1i64 << exp).min(3600)
}

fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LEN {
        message.to_string()
    } else {
        message.chars().take(MAX_ERROR_LEN).collect()
    }
}

fn job_from_row(row: &SqliteRow) -> Result<TranslationJob, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let job_type: String = row.try_get("job_type")?;
    let job_type = job_type
        .parse::<JobType>()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "job_type".to_string(),
            source: Box::new(e),
        })?;
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<JobStatus>()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: "status".to_string(),
            source: Box::new(e),
        })?;
    let available_at: i64 = row.try_get("available_at")?;
    let reserved_at: Option<i64> = row.try_get("reserved_at")?;

    Ok(TranslationJob {
        id: decode_uuid("id", &id)?,
        job_type,
        dedupe_key: row.try_get("dedupe_key")?,
        payload: row.try_get("payload")?,
        status,
        attempts: row.try_get("attempts")?,
        max_attempts: row.try_get("max_attempts")?,
        available_at: from_unix("available_at", available_at)?,
        reserved_at: reserved_at.map(|s| from_unix("reserved_at", s)).transpose()?,
        last_error: row.try_get("last_error")?,
    })
}

fn from_unix(index: &str, secs: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| sqlx::Error::ColumnDecode {
        index: index.to_string(),
        source: format!("timestamp {secs} out of range").into(),
    })
}
