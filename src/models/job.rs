use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a translation job in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Translatable content type. One variant per job type; dispatch on this is
/// exhaustive everywhere a payload or table name is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobType {
    EventTitle,
    TagName,
}

impl JobType {
    /// Human-readable label for the translation prompt.
    pub fn source_label(self) -> &'static str {
        match self {
            JobType::EventTitle => "event title",
            JobType::TagName => "tag name",
        }
    }
}

/// Type-specific job payload, tagged by content type. The source text and
/// hash are a discovery-time snapshot; processing always re-resolves the
/// live source and only uses the snapshot hash for staleness comparisons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobPayload {
    EventTitle {
        event_id: Uuid,
        locale: String,
        source_text: Option<String>,
        source_hash: Option<String>,
    },
    TagName {
        tag_id: Uuid,
        locale: String,
        source_text: Option<String>,
        source_hash: Option<String>,
    },
}

impl JobPayload {
    pub fn new(
        job_type: JobType,
        target_id: Uuid,
        locale: String,
        source_text: Option<String>,
        source_hash: Option<String>,
    ) -> Self {
        match job_type {
            JobType::EventTitle => JobPayload::EventTitle {
                event_id: target_id,
                locale,
                source_text,
                source_hash,
            },
            JobType::TagName => JobPayload::TagName {
                tag_id: target_id,
                locale,
                source_text,
                source_hash,
            },
        }
    }

    pub fn target_id(&self) -> Uuid {
        match self {
            JobPayload::EventTitle { event_id, .. } => *event_id,
            JobPayload::TagName { tag_id, .. } => *tag_id,
        }
    }

    pub fn locale(&self) -> &str {
        match self {
            JobPayload::EventTitle { locale, .. } => locale,
            JobPayload::TagName { locale, .. } => locale,
        }
    }

    pub fn source_hash(&self) -> Option<&str> {
        match self {
            JobPayload::EventTitle { source_hash, .. } => source_hash.as_deref(),
            JobPayload::TagName { source_hash, .. } => source_hash.as_deref(),
        }
    }
}

/// Deterministic identity of a (target, locale) pair within a job type.
/// Doubles as the uniqueness key for live jobs.
pub fn dedupe_key(target_id: Uuid, locale: &str) -> String {
    format!("{target_id}:{locale}")
}

/// Recover (target, locale) from a dedupe key. Fallback identity source when
/// a stored payload fails to parse; the caller decides what to do on `None`.
pub fn split_dedupe_key(key: &str) -> Option<(Uuid, String)> {
    let (id, locale) = key.split_once(':')?;
    if locale.is_empty() {
        return None;
    }
    let id = Uuid::parse_str(id).ok()?;
    Some((id, locale.to_string()))
}

/// A persisted translation job.
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub id: Uuid,
    pub job_type: JobType,
    pub dedupe_key: String,
    /// Raw payload column. Interpreting it can fail, so parsing is explicit
    /// rather than baked into row decoding.
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: i64,
    pub max_attempts: i64,
    pub available_at: DateTime<Utc>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl TranslationJob {
    pub fn parse_payload(&self) -> Result<JobPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}
