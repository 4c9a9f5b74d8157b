//! End-to-end tests against a running server.
//!
//! These require:
//! 1. The API server running on the configured port
//! 2. CRON_SECRET set to the same value the server uses
//!
//! Run with: cargo test --test e2e_test -- --ignored --nocapture
//!
//! Set API_BASE_URL to override default (http://localhost:3000)

fn get_base_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

#[tokio::test]
#[ignore] // Requires a running API server
async fn test_e2e_health_check() {
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", get_base_url()))
        .send()
        .await
        .expect("Health check failed");

    assert!(
        response.status().is_success(),
        "Health check returned non-success status: {}",
        response.status()
    );
}

#[tokio::test]
#[ignore] // Requires a running API server
async fn test_e2e_sync_requires_secret() {
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/sync", get_base_url()))
        .send()
        .await
        .expect("Sync request failed");

    assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires a running API server and CRON_SECRET
async fn test_e2e_sync_returns_summary() {
    let secret = std::env::var("CRON_SECRET").expect("CRON_SECRET not set");
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/v1/sync", get_base_url()))
        .bearer_auth(secret)
        .send()
        .await
        .expect("Sync request failed");

    assert!(response.status().is_success());

    let summary: serde_json::Value = response.json().await.expect("Summary is not JSON");
    assert!(summary.get("status").is_some());
    assert!(summary.get("completed").is_some());
}
