use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use datakult::config::Config;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// Default API key seeded by migration (must match m20250630_add_users.rs)
const DEFAULT_API_KEY: &str = "datakult_default_api_key_please_regenerate";

/// Each test gets a file-backed scratch database; with a pooled
/// `sqlite::memory:` every connection would see its own empty schema.
async fn spawn_app() -> Router {
    let scratch = std::env::temp_dir().join(format!("datakult-api-test-{}", uuid::Uuid::new_v4()));
    tokio::fs::create_dir_all(&scratch)
        .await
        .expect("Failed to create scratch dir");

    let mut config = Config::default();
    config.general.database_path = format!("sqlite:{}", scratch.join("catalog.db").display());
    config.general.media_path = scratch.join("media").display().to_string();
    config.backup.directory = scratch.join("backups").display().to_string();

    let state = datakult::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");
    datakult::api::router(state).await
}

#[tokio::test]
async fn test_auth_endpoints() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/media")
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
                .uri("/api/media")
                .header("X-Api-Key", "wrong-key")
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
                .uri("/api/media")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_media_crud_flow() {
    let app = spawn_app().await;

    let payload = serde_json::json!({
        "title": "Blade Runner",
        "media_type": "FILM",
        "status": "PLANNED",
        "pub_year": 1982,
        "review": "A **masterpiece** of mood.",
        "contributors": ["Ridley Scott"],
        "tags": ["sci-fi"]
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/media")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["success"], true);
    assert_eq!(body_json["data"]["title"], "Blade Runner");
    assert_eq!(body_json["data"]["media_type"], "FILM");
    assert_eq!(body_json["data"]["status"], "PLANNED");
    assert_eq!(body_json["data"]["pub_year"], 1982);
    assert!(
        body_json["data"]["review_html"]
            .as_str()
            .unwrap()
            .contains("<strong>masterpiece</strong>")
    );
    assert_eq!(body_json["data"]["contributors"][0]["name"], "Ridley Scott");
    assert_eq!(body_json["data"]["tags"][0]["name"], "sci-fi");

    let id = body_json["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/media/{id}"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    // Full replace with a changed status and a fresh score; this is an
    // engagement change and must append a second activity row.
    let update = serde_json::json!({
        "title": "Blade Runner",
        "media_type": "FILM",
        "status": "COMPLETED",
        "pub_year": 1982,
        "score": 9,
        "review": "A **masterpiece** of mood.",
        "review_date": "2026-07",
        "contributors": ["Ridley Scott"],
        "tags": ["sci-fi"]
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/media/{id}"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&update).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"]["status"], "COMPLETED");
    assert_eq!(body_json["data"]["score"], 9);
    assert_eq!(body_json["data"]["review_date"], "2026-07");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/media/{id}/activity"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let rows = body_json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row["media_id"].as_i64() == Some(id)));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/media?status=COMPLETED")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"]["total_items"], 1);
    assert_eq!(body_json["data"]["page"], 1);
    assert_eq!(body_json["data"]["sort"], "-review_date");
    assert_eq!(body_json["data"]["view_mode"], "grid");
    assert_eq!(body_json["data"]["items"][0]["id"], id);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/media?status=PLANNED")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"]["total_items"], 0);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/media/{id}"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/media/{id}"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The deleted entry was the only credit for both the agent and the
    // tag, so the orphans are pruned with it.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/agents?q=ridley")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_media_validation_errors() {
    let app = spawn_app().await;

    let cases = [
        (
            serde_json::json!({"title": "   ", "media_type": "FILM", "status": "PLANNED"}),
            "Title cannot be empty",
        ),
        (
            serde_json::json!({"title": "X", "media_type": "PODCAST", "status": "PLANNED"}),
            "unknown media type",
        ),
        (
            serde_json::json!({"title": "X", "media_type": "FILM", "status": "PLANNED", "score": 11}),
            "Score must be between 1 and 10",
        ),
        (
            serde_json::json!({"title": "X", "media_type": "FILM", "status": "PLANNED", "pub_year": 9000}),
            "Year must be between",
        ),
        (
            serde_json::json!({"title": "X", "media_type": "FILM", "status": "PLANNED", "review_date": "soon"}),
            "Invalid date",
        ),
        (
            serde_json::json!({"title": "X", "media_type": "FILM", "status": "PLANNED", "contributors": [99999]}),
            "Unknown agent id: 99999",
        ),
    ];

    for (payload, expected) in cases {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/media")
                    .header("X-Api-Key", DEFAULT_API_KEY)
                    .header("Content-Type", "application/json")
                    .body(Body::from(serde_json::to_string(&payload).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload}");

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(body_json["success"], false);
        assert!(
            body_json["error"].as_str().unwrap().contains(expected),
            "expected {expected:?} in {body_json}"
        );
    }
}

#[tokio::test]
async fn test_views_crud() {
    let app = spawn_app().await;

    let payload = serde_json::json!({
        "name": "Best films",
        "query_string": "type=FILM&sort=-score&page=3&bogus=1",
        "view_mode": ""
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/views")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // The stored query string is rebuilt from the whitelist: unknown
    // parameters and the page are dropped.
    assert_eq!(body_json["data"]["name"], "Best films");
    assert_eq!(
        body_json["data"]["query_string"],
        "type=FILM&sort=-score&view_mode=grid"
    );
    assert_eq!(body_json["data"]["view_mode"], "grid");

    let view_id = body_json["data"]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/views")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/views")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"].as_array().unwrap().len(), 1);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/views/{view_id}"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/views/{view_id}"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_lookup_provider_errors() {
    let app = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/lookup/frobnicator/search?q=dune")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
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
            .contains("Unknown provider")
    );

    // No TMDB key in the default config.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/lookup/tmdb/search?q=dune")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    // OpenLibrary needs no credentials; a one-character query is answered
    // with an empty list without contacting the provider.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/lookup/openlibrary/search?q=a")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_agents_and_tags() {
    let app = spawn_app().await;

    let payload = serde_json::json!({
        "title": "Dune",
        "media_type": "BOOK",
        "status": "COMPLETED",
        "pub_year": 1965,
        "contributors": ["Frank Herbert"],
        "tags": ["sci-fi"]
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/media")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_string(&payload).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/agents?q=herbert")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let agents = body_json["data"].as_array().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["name"], "Frank Herbert");

    let agent_id = agents[0]["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/agents/{agent_id}"))
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    assert_eq!(body_json["data"]["agent"]["name"], "Frank Herbert");
    assert_eq!(body_json["data"]["media"][0]["title"], "Dune");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/agents/999999")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/tags")
                .header("X-Api-Key", DEFAULT_API_KEY)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body_json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    let tags = body_json["data"].as_array().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0]["name"], "sci-fi");
    assert_eq!(tags[0]["media_count"], 1);
}
