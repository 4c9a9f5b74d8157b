//! Job store invariants: idempotent upserts, atomic claims, retry/backoff
//! transitions, and terminal failure behavior.

mod helpers;

use chrono::{Duration, Utc};
use helpers::*;
use sqlx::Row;
use uuid::Uuid;

use translation_sync::db::job_queries::{self, STALE_CLAIM_SECS};
use translation_sync::models::job::{dedupe_key, JobStatus, JobType};

#[tokio::test]
async fn upsert_creates_once_and_skips_live_jobs() {
    let pool = test_pool().await;
    let target = Uuid::new_v4();
    let row = discovered_job(JobType::EventTitle, target, "es", "Summer Festival");
    let now = Utc::now();

    let first = job_queries::upsert_discovered(&pool, &[row.clone()], now)
        .await
        .unwrap();
    assert_eq!(first, 1);

    // Pending job already owns this (target, locale): redundant upsert is a no-op.
    let second = job_queries::upsert_discovered(&pool, &[row.clone()], now)
        .await
        .unwrap();
    assert_eq!(second, 0);

    // Same while the job is being processed.
    let job = job_queries::find_by_dedupe(&pool, JobType::EventTitle, &row.dedupe_key)
        .await
        .unwrap()
        .expect("job exists");
    job_queries::claim(&pool, job.id, now)
        .await
        .unwrap()
        .expect("claimable");
    let third = job_queries::upsert_discovered(&pool, &[row.clone()], now)
        .await
        .unwrap();
    assert_eq!(third, 0);

    // Never more than one row per (job_type, dedupe_key).
    let count: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM translation_jobs WHERE job_type = ? AND dedupe_key = ?",
    )
    .bind("event_title")
    .bind(&row.dedupe_key)
    .fetch_one(&pool)
    .await
    .unwrap()
    .get("n");
    assert_eq!(count, 1);
}

#[tokio::test]
async fn completed_jobs_are_overwritten_on_rediscovery() {
    let pool = test_pool().await;
    let target = Uuid::new_v4();
    let now = Utc::now();

    let row = discovered_job(JobType::TagName, target, "fr", "music");
    job_queries::upsert_discovered(&pool, &[row.clone()], now)
        .await
        .unwrap();
    let job = job_queries::find_by_dedupe(&pool, JobType::TagName, &row.dedupe_key)
        .await
        .unwrap()
        .unwrap();
    let claimed = job_queries::claim(&pool, job.id, now).await.unwrap().unwrap();
    let final_payload = claimed.parse_payload().unwrap();
    job_queries::complete(&pool, &claimed, &final_payload, now)
        .await
        .unwrap();

    // Content drifted since completion: the job revives as pending.
    let drifted = discovered_job(JobType::TagName, target, "fr", "live music");
    let enqueued = job_queries::upsert_discovered(&pool, &[drifted], now)
        .await
        .unwrap();
    assert_eq!(enqueued, 1);

    let revived = job_queries::find_by_dedupe(&pool, JobType::TagName, &row.dedupe_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(revived.status, JobStatus::Pending);
    assert_eq!(revived.attempts, 0);
}

#[tokio::test]
async fn two_racing_claims_yield_exactly_one_winner() {
    let pool = test_pool().await;
    let target = Uuid::new_v4();
    let now = Utc::now();

    let row = discovered_job(JobType::EventTitle, target, "de", "Open Mic Night");
    job_queries::upsert_discovered(&pool, &[row.clone()], now)
        .await
        .unwrap();
    let job = job_queries::find_by_dedupe(&pool, JobType::EventTitle, &row.dedupe_key)
        .await
        .unwrap()
        .unwrap();

    let (a, b) = futures::join!(
        job_queries::claim(&pool, job.id, now),
        job_queries::claim(&pool, job.id, now),
    );
    let a = a.unwrap();
    let b = b.unwrap();

    assert!(a.is_some() != b.is_some(), "exactly one claim must win");
    let winner = a.or(b).unwrap();
    assert_eq!(winner.status, JobStatus::Processing);
    assert!(winner.reserved_at.is_some());
}

#[tokio::test]
async fn fetch_due_orders_by_availability_and_respects_limit() {
    let pool = test_pool().await;
    let now = Utc::now();

    let mut keys = Vec::new();
    for (i, title) in ["One", "Two", "Three"].iter().enumerate() {
        let target = Uuid::new_v4();
        let row = discovered_job(JobType::EventTitle, target, "es", title);
        job_queries::upsert_discovered(&pool, &[row.clone()], now)
            .await
            .unwrap();
        let job = job_queries::find_by_dedupe(&pool, JobType::EventTitle, &row.dedupe_key)
            .await
            .unwrap()
            .unwrap();
        // Stagger eligibility: Three earliest, then Two, then One.
        sqlx::query("UPDATE translation_jobs SET available_at = ? WHERE id = ?")
            .bind(now.timestamp() - 100 - (i as i64) * 10)
            .bind(job.id.to_string())
            .execute(&pool)
            .await
            .unwrap();
        keys.push(row.dedupe_key);
    }

    let due = job_queries::fetch_due(&pool, now, 2).await.unwrap();
    assert_eq!(due.len(), 2);
    assert_eq!(due[0].dedupe_key, keys[2]);
    assert_eq!(due[1].dedupe_key, keys[1]);
}

#[tokio::test]
async fn retry_backs_off_then_fails_terminally() {
    let pool = test_pool().await;
    let target = Uuid::new_v4();
    let row = discovered_job(JobType::EventTitle, target, "es", "Night Market");
    let key = dedupe_key(target, "es");

    let mut now = Utc::now();
    job_queries::upsert_discovered(&pool, &[row.clone()], now)
        .await
        .unwrap();
    let job = job_queries::find_by_dedupe(&pool, JobType::EventTitle, &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.max_attempts, 5);

    // First failure: attempts 0 -> 1, pending again ~2s out.
    let claimed = job_queries::claim(&pool, job.id, now).await.unwrap().unwrap();
    let terminal = job_queries::schedule_retry_or_fail(&pool, &claimed, "network error", now)
        .await
        .unwrap();
    assert!(!terminal);

    let retried = job_queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(retried.status, JobStatus::Pending);
    assert_eq!(retried.attempts, 1);
    assert_eq!(
        retried.available_at.timestamp(),
        now.timestamp() + job_queries::backoff_secs(1)
    );
    assert_eq!(retried.last_error.as_deref(), Some("network error"));

    // Not due until the backoff elapses.
    assert!(job_queries::fetch_due(&pool, now, 10).await.unwrap().is_empty());

    // Drive the remaining attempts to the ceiling.
    let mut last_failure_at = now;
    for attempt in 2..=5 {
        now += Duration::seconds(7200);
        let claimed = job_queries::claim(&pool, job.id, now).await.unwrap().unwrap();
        let terminal = job_queries::schedule_retry_or_fail(&pool, &claimed, "still broken", now)
            .await
            .unwrap();
        assert_eq!(terminal, attempt == 5, "attempt {attempt}");
        last_failure_at = now;
    }

    let failed = job_queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.attempts, 5);
    // Terminal failure is visible immediately, with no further backoff.
    assert_eq!(failed.available_at.timestamp(), last_failure_at.timestamp());

    // Failed jobs are never due again, no matter how far time advances.
    let far_future = now + Duration::days(365);
    assert!(job_queries::fetch_due(&pool, far_future, 10).await.unwrap().is_empty());

    // Rediscovery with the same source hash must not revive it.
    let same = job_queries::upsert_discovered(&pool, &[row], now).await.unwrap();
    assert_eq!(same, 0);

    // A changed source hash does.
    let changed = discovered_job(JobType::EventTitle, target, "es", "Night Market 2026");
    let revived = job_queries::upsert_discovered(&pool, &[changed], now).await.unwrap();
    assert_eq!(revived, 1);
    let job = job_queries::find_by_dedupe(&pool, JobType::EventTitle, &key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.attempts, 0);
}

#[tokio::test]
async fn abandoned_claims_become_claimable_after_lease_expiry() {
    let pool = test_pool().await;
    let target = Uuid::new_v4();
    let now = Utc::now();

    let row = discovered_job(JobType::TagName, target, "es", "outdoors");
    job_queries::upsert_discovered(&pool, &[row.clone()], now)
        .await
        .unwrap();
    let job = job_queries::find_by_dedupe(&pool, JobType::TagName, &row.dedupe_key)
        .await
        .unwrap()
        .unwrap();

    // Claim, then pretend the invocation crashed before resolving.
    job_queries::claim(&pool, job.id, now).await.unwrap().unwrap();

    let soon = now + Duration::seconds(60);
    assert!(job_queries::fetch_due(&pool, soon, 10).await.unwrap().is_empty());
    assert!(job_queries::claim(&pool, job.id, soon).await.unwrap().is_none());

    let after_lease = now + Duration::seconds(STALE_CLAIM_SECS + 10);
    let due = job_queries::fetch_due(&pool, after_lease, 10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert!(job_queries::claim(&pool, job.id, after_lease)
        .await
        .unwrap()
        .is_some());
}
