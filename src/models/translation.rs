use sha2::{Digest, Sha256};

/// Stored metadata for one (target, locale) translation row.
#[derive(Debug, Clone)]
pub struct TranslationMeta {
    pub source_hash: Option<String>,
    pub is_manual: bool,
}

/// Hash of upstream source text, used to detect stale translations.
pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(digest)
}
