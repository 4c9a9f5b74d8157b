use serde::Deserialize;
use std::time::Duration;

use crate::services::runner::SyncOptions;

/// Source content is authored in this locale; it is never a translation
/// target even if deployment config lists it.
const BASE_LOCALE: &str = "en";

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Unused by the one-shot binary.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// SQLite connection string (e.g., "sqlite://data/translation-sync.db")
    pub database_url: String,

    /// Shared secret expected from the external scheduler
    pub cron_secret: String,

    /// Translation provider API key; sync runs are skipped when unset
    #[serde(default)]
    pub openai_api_key: Option<String>,

    /// Override for the translation model
    #[serde(default)]
    pub translation_model: Option<String>,

    /// Feature flag gating automatic translations
    #[serde(default = "default_enabled")]
    pub auto_translations_enabled: bool,

    /// Comma-separated target locales (e.g., "es,fr,de")
    #[serde(default)]
    pub enabled_locales: Vec<String>,

    /// Wall-clock budget for one sync invocation, in seconds
    #[serde(default = "default_time_budget_secs")]
    pub sync_time_budget_secs: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_time_budget_secs() -> u64 {
    50
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Snapshot this configuration into the orchestrator's read-only options.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            translations_enabled: self.auto_translations_enabled,
            provider_configured: self
                .openai_api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty()),
            enabled_locales: self
                .enabled_locales
                .iter()
                .map(|locale| locale.trim().to_string())
                .filter(|locale| !locale.is_empty() && locale != BASE_LOCALE)
                .collect(),
            time_budget: Duration::from_secs(self.sync_time_budget_secs),
            ..SyncOptions::default()
        }
    }
}
