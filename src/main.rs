use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use translation_sync::app_state::AppState;
use translation_sync::config::AppConfig;
use translation_sync::services::translator::OpenAiTranslator;
use translation_sync::{db, routes};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing translation-sync server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!(
        "translation_jobs_completed_total",
        "Translation jobs completed successfully"
    );
    metrics::describe_counter!(
        "translation_jobs_retried_total",
        "Translation jobs rescheduled after a failure"
    );
    metrics::describe_counter!(
        "translation_jobs_failed_total",
        "Translation jobs that exhausted their attempts"
    );
    metrics::describe_counter!(
        "translation_jobs_enqueued_total",
        "Translation jobs enqueued by discovery"
    );
    metrics::describe_histogram!(
        "translation_sync_run_seconds",
        "Wall-clock duration of one sync invocation"
    );

    // Initialize database connection pool
    tracing::info!("Connecting to SQLite database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize the translation provider client
    let translator = Arc::new(OpenAiTranslator::new(
        config.openai_api_key.clone().unwrap_or_default(),
        config.translation_model.clone(),
    ));

    let sync_options = config.sync_options();
    if sync_options.enabled_locales.is_empty() {
        tracing::warn!("No enabled locales configured; sync runs will be skipped");
    }

    // Create shared application state
    let state = AppState::new(
        db_pool,
        translator,
        sync_options,
        config.cron_secret.clone(),
    );

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/v1/sync", post(routes::sync::trigger_sync))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting translation-sync on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
