use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::runner::SyncOptions;
use crate::services::translator::TranslationProvider;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub translator: Arc<dyn TranslationProvider>,
    pub sync_options: Arc<SyncOptions>,
    pub cron_secret: String,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        translator: Arc<dyn TranslationProvider>,
        sync_options: SyncOptions,
        cron_secret: String,
    ) -> Self {
        Self {
            db,
            translator,
            sync_options: Arc::new(sync_options),
            cron_secret,
        }
    }
}
