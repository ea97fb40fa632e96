//! Integration tests for the system endpoints: health probe, status,
//! configuration round trip with credential masking, and metrics.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use datakult::config::Config;
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app_with(mut config: Config) -> (Arc<datakult::api::AppState>, Router, String) {
    let scratch =
        std::env::temp_dir().join(format!("datakult-system-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&scratch)
        .await
        .expect("Failed to create scratch dir");

    config.general.database_path = format!("sqlite:{}", scratch.join("catalog.db").display());
    config.general.media_path = scratch.join("media").display().to_string();
    config.backup.directory = scratch.join("backups").display().to_string();

    let state = datakult::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");

    let api_key = state
        .store()
        .get_user_api_key("admin")
        .await
        .expect("Failed to fetch bootstrap API key")
        .expect("Bootstrap admin user missing API key");

    let router = datakult::api::router(state.clone()).await;
    (state, router, api_key)
}

async fn spawn_app() -> (Arc<datakult::api::AppState>, Router, String) {
    spawn_app_with(Config::default()).await
}

#[tokio::test]
async fn test_health_not_protected() {
    let (_, app, _) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(body_json["success"].as_bool().unwrap_or(false));
    assert_eq!(body_json["data"]["status"], "alive");
}

#[tokio::test]
async fn test_get_status() {
    let (_, app, api_key) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/status")
                .header("X-Api-Key", api_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(body_json["success"].as_bool().unwrap());

    let data = body_json["data"].as_object().unwrap();
    assert!(data.get("version").is_some());
    assert!(data.get("uptime").is_some());
    assert_eq!(data["database"], true);
    assert_eq!(data["media_count"], 0);
    assert_eq!(data["agent_count"], 0);
    assert_eq!(data["tag_count"], 0);
}

#[tokio::test]
async fn test_config_masking_and_update() {
    let mut config = Config::default();
    config.metadata.tmdb_api_key = "tmdb-secret-123".to_string();
    config.metadata.igdb_client_id = "igdb-client-1".to_string();
    config.metadata.igdb_client_secret = "igdb-secret-456".to_string();

    let (state, app, api_key) = spawn_app_with(config).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/config")
                .header("X-Api-Key", api_key.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // Secrets are masked; the IGDB client id is not a secret.
    assert_eq!(body_json["data"]["metadata"]["tmdb_api_key"], "********");
    assert_eq!(
        body_json["data"]["metadata"]["igdb_client_secret"],
        "********"
    );
    assert_eq!(
        body_json["data"]["metadata"]["igdb_client_id"],
        "igdb-client-1"
    );

    // Send the masked payload back with one real edit.
    let mut current_config = body_json["data"].clone();
    current_config["metadata"]["language"] = serde_json::json!("en-US");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/system/config")
                .header("X-Api-Key", api_key.clone())
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&current_config).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/system/config")
                .header("X-Api-Key", api_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"]["metadata"]["language"], "en-US");

    // The mask in the payload must not overwrite the stored secret.
    let live = state.config().read().await;
    assert_eq!(live.metadata.tmdb_api_key, "tmdb-secret-123");
    assert_eq!(live.metadata.igdb_client_secret, "igdb-secret-456");
    assert_eq!(live.metadata.language, "en-US");
}

#[tokio::test]
async fn test_config_update_rejects_invalid() {
    let (state, app, api_key) = spawn_app().await;

    let mut payload = serde_json::to_value(state.config().read().await.clone()).unwrap();
    payload["backup"]["keep"] = serde_json::json!(0);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/system/config")
                .header("X-Api-Key", api_key)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert!(
        body_json["error"]
            .as_str()
            .unwrap()
            .contains("keep at least one archive")
    );

    // The live configuration is untouched.
    assert_eq!(state.config().read().await.backup.keep, 10);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (_, app, api_key) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/metrics")
                .header("X-Api-Key", api_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // No Prometheus recorder is installed in tests; the endpoint still
    // answers instead of failing.
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("Metrics not enabled"));
}
