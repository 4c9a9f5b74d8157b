//! Shared fixtures for integration tests: an in-memory database with the
//! full schema, seeded content rows, and a scriptable translation provider.

#![allow(dead_code)]

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use translation_sync::models::job::{dedupe_key, JobPayload, JobType};
use translation_sync::models::translation::content_hash;
use translation_sync::db::job_queries::DiscoveredJob;
use translation_sync::services::runner::SyncOptions;
use translation_sync::services::translator::{
    BatchItem, BatchTranslation, TranslationProvider, TranslatorError,
};

/// Fresh in-memory database with migrations applied. A single connection
/// keeps every handle on the same database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn test_options(locales: &[&str]) -> SyncOptions {
    SyncOptions {
        translations_enabled: true,
        provider_configured: true,
        enabled_locales: locales.iter().map(|locale| locale.to_string()).collect(),
        time_budget: Duration::from_secs(30),
        ..SyncOptions::default()
    }
}

pub async fn insert_event(pool: &SqlitePool, title: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO events (id, title, created_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(title)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await
        .expect("Failed to insert event");
    id
}

pub async fn insert_tag(pool: &SqlitePool, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO tags (id, name, created_at) VALUES (?, ?, ?)")
        .bind(id.to_string())
        .bind(name)
        .bind(Utc::now().timestamp())
        .execute(pool)
        .await
        .expect("Failed to insert tag");
    id
}

/// Insert an event translation whose source_hash matches `translated_from`.
pub async fn insert_event_translation(
    pool: &SqlitePool,
    event_id: Uuid,
    locale: &str,
    title: &str,
    translated_from: &str,
    is_manual: bool,
) {
    sqlx::query(
        "INSERT INTO event_translations (event_id, locale, title, source_hash, is_manual, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(event_id.to_string())
    .bind(locale)
    .bind(title)
    .bind(content_hash(translated_from))
    .bind(is_manual)
    .bind(Utc::now().timestamp())
    .execute(pool)
    .await
    .expect("Failed to insert event translation");
}

/// Build a discovery candidate the way the scanner would.
pub fn discovered_job(job_type: JobType, target_id: Uuid, locale: &str, source_text: &str) -> DiscoveredJob {
    let hash = content_hash(source_text);
    DiscoveredJob {
        job_type,
        dedupe_key: dedupe_key(target_id, locale),
        payload: JobPayload::new(
            job_type,
            target_id,
            locale.to_string(),
            Some(source_text.to_string()),
            Some(hash),
        ),
    }
}

pub async fn fetch_event_translation(
    pool: &SqlitePool,
    event_id: Uuid,
    locale: &str,
) -> Option<(String, String, bool)> {
    use sqlx::Row;
    sqlx::query(
        "SELECT title, source_hash, is_manual FROM event_translations WHERE event_id = ? AND locale = ?",
    )
    .bind(event_id.to_string())
    .bind(locale)
    .fetch_optional(pool)
    .await
    .expect("Failed to read event translation")
    .map(|row| {
        (
            row.get::<String, _>("title"),
            row.get::<Option<String>, _>("source_hash").unwrap_or_default(),
            row.get::<bool, _>("is_manual"),
        )
    })
}

type ProviderScript =
    Box<dyn Fn(&[BatchItem]) -> Result<Vec<BatchTranslation>, TranslatorError> + Send + Sync>;

/// Translation provider driven by a closure, recording every batch it sees.
pub struct ScriptedProvider {
    script: ProviderScript,
    pub calls: Mutex<Vec<Vec<BatchItem>>>,
}

impl ScriptedProvider {
    pub fn new(
        script: impl Fn(&[BatchItem]) -> Result<Vec<BatchTranslation>, TranslatorError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// "Translates" by prefixing the locale code, so assertions can tell
    /// outputs apart without a real model.
    pub fn echo() -> Self {
        Self::new(|items| {
            Ok(items
                .iter()
                .map(|item| BatchTranslation {
                    id: item.id,
                    text: format!("[{}] {}", item.locale, item.source_text),
                })
                .collect())
        })
    }

    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(TranslatorError::Parse(message.clone())))
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TranslationProvider for ScriptedProvider {
    async fn translate_batch(
        &self,
        items: &[BatchItem],
    ) -> Result<Vec<BatchTranslation>, TranslatorError> {
        self.calls.lock().unwrap().push(items.to_vec());
        (self.script)(items)
    }
}
