use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, SqlitePool};
use uuid::Uuid;

use crate::db::decode_uuid;
use crate::models::job::JobType;
use crate::models::translation::TranslationMeta;

/// One source row in the base locale.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: Uuid,
    pub text: String,
}

/// Table and column names per content type. The enum is closed, so the SQL
/// built from these is a fixed set of statements.
fn tables(job_type: JobType) -> ContentTables {
    match job_type {
        JobType::EventTitle => ContentTables {
            source_table: "events",
            text_column: "title",
            translation_table: "event_translations",
            target_column: "event_id",
        },
        JobType::TagName => ContentTables {
            source_table: "tags",
            text_column: "name",
            translation_table: "tag_translations",
            target_column: "tag_id",
        },
    }
}

struct ContentTables {
    source_table: &'static str,
    text_column: &'static str,
    translation_table: &'static str,
    target_column: &'static str,
}

/// List a page of source rows in stable id order, keyset-paginated.
pub async fn list_source_page(
    pool: &SqlitePool,
    job_type: JobType,
    after_id: Option<Uuid>,
    limit: i64,
) -> Result<Vec<SourceRecord>, sqlx::Error> {
    let t = tables(job_type);
    let sql = format!(
        "SELECT id, {text} AS text FROM {table} WHERE id > COALESCE(?, '') ORDER BY id ASC LIMIT ?",
        text = t.text_column,
        table = t.source_table,
    );

    let rows = sqlx::query(&sql)
        .bind(after_id.map(|id| id.to_string()))
        .bind(limit)
        .fetch_all(pool)
        .await?;

    rows.iter()
        .map(|row| {
            let id: String = row.try_get("id")?;
            Ok(SourceRecord {
                id: decode_uuid("id", &id)?,
                text: row.try_get("text")?,
            })
        })
        .collect()
}

/// Current source text for one target, or `None` if it was deleted.
pub async fn get_source_text(
    pool: &SqlitePool,
    job_type: JobType,
    target_id: Uuid,
) -> Result<Option<String>, sqlx::Error> {
    let t = tables(job_type);
    let sql = format!(
        "SELECT {text} AS text FROM {table} WHERE id = ?",
        text = t.text_column,
        table = t.source_table,
    );

    let row = sqlx::query(&sql)
        .bind(target_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| r.try_get("text")).transpose()
}

/// Bulk-load translation metadata for a page of targets across all enabled
/// locales, keyed by (target, locale). Pairs without a row are simply absent.
pub async fn load_translation_meta(
    pool: &SqlitePool,
    job_type: JobType,
    target_ids: &[Uuid],
    locales: &[String],
) -> Result<HashMap<(Uuid, String), TranslationMeta>, sqlx::Error> {
    if target_ids.is_empty() || locales.is_empty() {
        return Ok(HashMap::new());
    }

    let t = tables(job_type);
    let mut qb = QueryBuilder::new(format!(
        "SELECT {target} AS target_id, locale, source_hash, is_manual FROM {table} WHERE {target} IN (",
        target = t.target_column,
        table = t.translation_table,
    ));
    let mut ids = qb.separated(", ");
    for id in target_ids {
        ids.push_bind(id.to_string());
    }
    qb.push(") AND locale IN (");
    let mut locs = qb.separated(", ");
    for locale in locales {
        locs.push_bind(locale.as_str());
    }
    qb.push(")");

    let rows = qb.build().fetch_all(pool).await?;

    let mut meta = HashMap::with_capacity(rows.len());
    for row in &rows {
        let target_id: String = row.try_get("target_id")?;
        let locale: String = row.try_get("locale")?;
        meta.insert(
            (decode_uuid("target_id", &target_id)?, locale),
            TranslationMeta {
                source_hash: row.try_get("source_hash")?,
                is_manual: row.try_get("is_manual")?,
            },
        );
    }
    Ok(meta)
}

/// Translation metadata for one (target, locale) pair.
pub async fn get_translation_meta(
    pool: &SqlitePool,
    job_type: JobType,
    target_id: Uuid,
    locale: &str,
) -> Result<Option<TranslationMeta>, sqlx::Error> {
    let t = tables(job_type);
    let sql = format!(
        "SELECT source_hash, is_manual FROM {table} WHERE {target} = ? AND locale = ?",
        table = t.translation_table,
        target = t.target_column,
    );

    let row = sqlx::query(&sql)
        .bind(target_id.to_string())
        .bind(locale)
        .fetch_optional(pool)
        .await?;

    row.map(|r| {
        Ok(TranslationMeta {
            source_hash: r.try_get("source_hash")?,
            is_manual: r.try_get("is_manual")?,
        })
    })
    .transpose()
}

/// Upsert an automated translation row. Always writes is_manual = 0; callers
/// must never reach this for a manual row.
pub async fn upsert_translation(
    pool: &SqlitePool,
    job_type: JobType,
    target_id: Uuid,
    locale: &str,
    text: &str,
    source_hash: &str,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    let t = tables(job_type);
    let sql = format!(
        "INSERT INTO {table} ({target}, locale, {text_col}, source_hash, is_manual, updated_at) \
         VALUES (?, ?, ?, ?, 0, ?) \
         ON CONFLICT({target}, locale) DO UPDATE SET \
           {text_col} = excluded.{text_col}, \
           source_hash = excluded.source_hash, \
           is_manual = 0, \
           updated_at = excluded.updated_at",
        table = t.translation_table,
        target = t.target_column,
        text_col = t.text_column,
    );

    sqlx::query(&sql)
        .bind(target_id.to_string())
        .bind(locale)
        .bind(text)
        .bind(source_hash)
        .bind(now.timestamp())
        .execute(pool)
        .await?;

    Ok(())
}
