use std::time::Instant;

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::content_queries;
use crate::db::job_queries::{self, DiscoveredJob};
use crate::models::job::{dedupe_key, JobPayload, JobType};
use crate::models::translation::content_hash;

/// Source rows fetched per page during a scan.
const PAGE_SIZE: i64 = 200;

/// Result of one discovery scan over a single content type.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanOutcome {
    /// Source entities examined.
    pub scanned: u64,
    /// Jobs actually created or revived in the store.
    pub enqueued: u64,
}

/// Scan one content type for missing or stale non-manual translations and
/// enqueue jobs for them.
///
/// Pages through the source table in stable id order, bulk-loads existing
/// translation metadata per page, and upserts a job for every
/// (entity, locale) pair that is neither manual nor hash-current. Stops at
/// the per-type quota, at the deadline, or when a short page signals the
/// corpus is exhausted. Safe to run concurrently with itself or with
/// processing: the store's uniqueness key makes redundant upserts no-ops.
pub async fn scan_content(
    pool: &SqlitePool,
    job_type: JobType,
    locales: &[String],
    quota: usize,
    deadline: Instant,
) -> Result<ScanOutcome, sqlx::Error> {
    let mut outcome = ScanOutcome::default();
    if locales.is_empty() || quota == 0 {
        return Ok(outcome);
    }

    let mut cursor: Option<Uuid> = None;
    let mut remaining = quota;

    loop {
        if Instant::now() >= deadline {
            break;
        }

        let page = content_queries::list_source_page(pool, job_type, cursor, PAGE_SIZE).await?;
        if page.is_empty() {
            break;
        }
        let short_page = (page.len() as i64) < PAGE_SIZE;
        cursor = page.last().map(|record| record.id);

        let ids: Vec<Uuid> = page.iter().map(|record| record.id).collect();
        let meta = content_queries::load_translation_meta(pool, job_type, &ids, locales).await?;

        let mut candidates = Vec::new();
        'page: for record in &page {
            outcome.scanned += 1;
            let hash = content_hash(&record.text);

            for locale in locales {
                match meta.get(&(record.id, locale.clone())) {
                    // Human-authored translations are never touched.
                    Some(m) if m.is_manual => continue,
                    // Already translated from this exact source text.
                    Some(m) if m.source_hash.as_deref() == Some(hash.as_str()) => continue,
                    _ => {}
                }

                candidates.push(DiscoveredJob {
                    job_type,
                    dedupe_key: dedupe_key(record.id, locale),
                    payload: JobPayload::new(
                        job_type,
                        record.id,
                        locale.clone(),
                        Some(record.text.clone()),
                        Some(hash.clone()),
                    ),
                });
                if candidates.len() >= remaining {
                    break 'page;
                }
            }
        }

        let quota_hit = candidates.len() >= remaining;
        remaining -= candidates.len();
        outcome.enqueued += job_queries::upsert_discovered(pool, &candidates, Utc::now()).await?;

        if quota_hit || short_page {
            break;
        }
    }

    tracing::debug!(
        job_type = %job_type,
        scanned = outcome.scanned,
        enqueued = outcome.enqueued,
        "discovery scan finished"
    );

    Ok(outcome)
}
