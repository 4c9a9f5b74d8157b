use tracing_subscriber::EnvFilter;

use translation_sync::config::AppConfig;
use translation_sync::db;
use translation_sync::services::runner;
use translation_sync::services::translator::OpenAiTranslator;

/// One-shot sync invocation for local cron or operator use. Loads config,
/// runs a single time-boxed sync, and prints the run summary as JSON.
#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting one-shot translation sync");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let translator = OpenAiTranslator::new(
        config.openai_api_key.clone().unwrap_or_default(),
        config.translation_model.clone(),
    );
    let options = config.sync_options();

    match runner::run_sync(&db_pool, &translator, &options).await {
        Ok(summary) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).expect("summary serializes")
            );
        }
        Err(aborted) => {
            tracing::error!(error = %aborted.error, "sync run aborted");
            println!(
                "{}",
                serde_json::to_string_pretty(&aborted.summary).expect("summary serializes")
            );
            std::process::exit(1);
        }
    }
}
