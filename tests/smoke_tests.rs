//! Smoke tests for the web flows the frontend drives: session login,
//! password rotation and the htmx fragments.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use datakult::config::Config;
use datakult::models::catalog::{EntityRef, MediaInput};
use datakult::models::media::{MediaStatus, MediaType};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

async fn spawn_app() -> (Arc<datakult::api::AppState>, Router, String) {
    let scratch =
        std::env::temp_dir().join(format!("datakult-smoke-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&scratch)
        .await
        .expect("failed to create scratch dir");

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", scratch.join("catalog.db").display());
    config.general.media_path = scratch.join("media").display().to_string();
    config.backup.directory = scratch.join("backups").display().to_string();

    let state = datakult::api::create_app_state_from_config(config, None)
        .await
        .expect("failed to create app state");

    let api_key = state
        .store()
        .get_user_api_key("admin")
        .await
        .expect("failed to fetch api key")
        .expect("missing bootstrap api key");

    let router = datakult::api::router(state.clone()).await;
    (state, router, api_key)
}

fn seed_entry(title: &str, contributor: &str) -> MediaInput {
    MediaInput {
        title: title.to_string(),
        media_type: MediaType::Book,
        status: MediaStatus::Completed,
        pub_year: Some(1965),
        score: Some(9),
        review: String::new(),
        review_html: String::new(),
        review_date: None,
        contributors: vec![EntityRef::Name(contributor.to_string())],
        tags: vec![EntityRef::Name("sci-fi".to_string())],
    }
}

#[tokio::test]
async fn smoke_login_session_and_password_rotation() {
    let (_, app, _) = spawn_app().await;

    // Wrong password stays out.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "admin",
                        "password": "invalid-password"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Bootstrap credentials log in and flag the forced password change.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "admin",
                        "password": "password"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("login should set a session cookie")
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["data"]["username"], "admin");
    assert_eq!(body_json["data"]["must_change_password"], true);

    // The session cookie alone authenticates API calls.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/auth/me")
                .header(header::COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["data"]["username"], "admin");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/auth/password")
                .header(header::COOKIE, cookie.clone())
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "current_password": "password",
                        "new_password": "correct-horse-battery"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Old password is dead, the new one works and the flag is cleared.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "admin",
                        "password": "password"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": "admin",
                        "password": "correct-horse-battery"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body_json["data"]["must_change_password"], false);
}

#[tokio::test]
async fn smoke_partials_catalogue_and_agent_picker() {
    let (state, app, api_key) = spawn_app().await;

    let entry = state
        .store()
        .create_media(&seed_entry("Dune", "Frank Herbert"))
        .await
        .expect("seed entry");
    let agent_id = entry.contributors[0].id;

    // Fragments are behind the same auth as the JSON API.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/partials/media")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/partials/media?type=BOOK")
                .header("X-Api-Key", api_key.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some(mime::TEXT_HTML_UTF_8.as_ref())
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("media-grid"));
    assert!(html.contains("Dune"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/partials/media?view_mode=list")
                .header("X-Api-Key", api_key.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("media-list"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/partials/agents/search?q=frank")
                .header("X-Api-Key", api_key.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("agent-suggestion"));
    assert!(html.contains("Frank Herbert"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/partials/agents/select")
                .header("X-Api-Key", api_key.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from(format!("id={agent_id}")))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("agent-chip"));
    assert!(html.contains("Frank Herbert"));
}

#[tokio::test]
async fn smoke_inline_field_validation() {
    let (_, app, api_key) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/partials/validate/media")
                .header("X-Api-Key", api_key.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("field=title&value="))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("text-error"));
    assert!(html.contains("Title cannot be empty"));

    // A valid value yields an empty fragment so the error slot clears.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/partials/validate/media")
                .header("X-Api-Key", api_key)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Body::from("field=score&value=7"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}
