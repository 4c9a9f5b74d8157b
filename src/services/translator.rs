use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const TEMPERATURE: f32 = 0.2;
const MAX_COMPLETION_TOKENS: u32 = 2000;

const SYSTEM_PROMPT: &str = concat!(
    "You are a professional translator for an events platform. ",
    "Each input item has an id, a source_text in English, a source_label describing ",
    "what kind of text it is, and a target locale with its locale_label. ",
    "Translate each source_text into its target locale, keeping names, numbers, ",
    "emoji and punctuation intact and matching the register of the source. ",
    "Respond with ONLY a JSON object of the form ",
    "{\"translations\":[{\"id\":\"<id>\",\"text\":\"<translated text>\"}]} ",
    "containing exactly one entry per input item."
);

/// One unit of work in a batch translation request. `id` is the job id, so
/// the response can be matched back without any ordering assumptions.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub id: Uuid,
    pub source_text: String,
    pub source_label: &'static str,
    pub locale: String,
    pub locale_label: String,
}

/// One translated entry recovered from a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchTranslation {
    pub id: Uuid,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TranslatorError {
    #[error("translation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("translation provider returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("translation provider returned no content")]
    EmptyResponse,

    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

/// The external translation capability. Object-safe so tests can inject a
/// scripted implementation.
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    async fn translate_batch(
        &self,
        items: &[BatchItem],
    ) -> Result<Vec<BatchTranslation>, TranslatorError>;
}

/// Client for an OpenAI-compatible chat-completions translation model.
pub struct OpenAiTranslator {
    http: Client,
    api_key: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl TranslationProvider for OpenAiTranslator {
    async fn translate_batch(
        &self,
        items: &[BatchItem],
    ) -> Result<Vec<BatchTranslation>, TranslatorError> {
        let items_json = serde_json::to_string(items)
            .map_err(|e| TranslatorError::Parse(format!("failed to encode request items: {e}")))?;

        let request_body = serde_json::json!({
            "model": self.model,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_COMPLETION_TOKENS,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": items_json },
            ],
        });

        let response = self
            .http
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TranslatorError::Status(response.status()));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(TranslatorError::EmptyResponse)?;

        parse_batch_response(&content)
    }
}

#[derive(Deserialize)]
struct WireResponse {
    translations: Option<Vec<WireEntry>>,
}

#[derive(Deserialize)]
struct WireEntry {
    id: Option<String>,
    text: Option<String>,
}

/// Parse the provider's `{"translations":[{"id","text"}]}` payload.
///
/// Models wrap JSON in markdown fences often enough that this strips them
/// first. Entries with an unparseable id or empty text are dropped rather
/// than failing the batch; the processor reschedules the jobs they belonged
/// to. A missing or empty array is a parse failure for the whole batch.
pub fn parse_batch_response(raw: &str) -> Result<Vec<BatchTranslation>, TranslatorError> {
    let body = strip_code_fences(raw);
    let wire: WireResponse = serde_json::from_str(body)
        .map_err(|e| TranslatorError::Parse(format!("response is not valid JSON: {e}")))?;

    let entries = wire
        .translations
        .ok_or_else(|| TranslatorError::Parse("response has no translations array".to_string()))?;
    if entries.is_empty() {
        return Err(TranslatorError::Parse("translations array is empty".to_string()));
    }

    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let id = Uuid::parse_str(entry.id?.trim()).ok()?;
            let text = normalize_text(&entry.text?);
            if text.is_empty() {
                return None;
            }
            Some(BatchTranslation { id, text })
        })
        .collect())
}

/// Index parsed entries by job id. Duplicate ids resolve to the last
/// occurrence; that is an assumed provider contract, not a guaranteed one.
pub fn index_translations(entries: Vec<BatchTranslation>) -> HashMap<Uuid, String> {
    let mut by_id = HashMap::with_capacity(entries.len());
    for entry in entries {
        by_id.insert(entry.id, entry.text);
    }
    by_id
}

/// English display name of a locale code for the prompt, falling back to the
/// code itself for anything unknown.
pub fn locale_label(code: &str) -> String {
    let label = match code {
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "nl" => "Dutch",
        "pl" => "Polish",
        "sv" => "Swedish",
        "da" => "Danish",
        "fi" => "Finnish",
        "no" | "nb" => "Norwegian",
        "cs" => "Czech",
        "tr" => "Turkish",
        "uk" => "Ukrainian",
        "ru" => "Russian",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "ar" => "Arabic",
        "hi" => "Hindi",
        _ => return code.to_string(),
    };
    label.to_string()
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    let inner = inner.strip_suffix("```").unwrap_or(inner);
    inner.trim()
}

/// Trim whitespace and strip one layer of wrapping quotes, which chat models
/// add around short strings with some regularity.
fn normalize_text(raw: &str) -> String {
    let mut text = raw.trim();
    for (open, close) in [('"', '"'), ('\u{201c}', '\u{201d}'), ('\'', '\'')] {
        if let Some(inner) = text
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            text = inner.trim();
            break;
        }
    }
    text.to_string()
}
