use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState, SystemStatus};
use crate::config::Config;

const MASK: &str = "********";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /system/status
///
/// Version, uptime, database reachability and catalogue counts.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<SystemStatus>>, ApiError> {
    let store = state.store();
    let database = store.ping().await.is_ok();

    let (media_count, agent_count, tag_count) = if database {
        (
            store.media_count().await.unwrap_or(0),
            store.agent_count().await.unwrap_or(0),
            store.tag_count().await.unwrap_or(0),
        )
    } else {
        (0, 0, 0)
    };

    Ok(Json(ApiResponse::success(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        database,
        media_count,
        agent_count,
        tag_count,
    })))
}

/// GET /system/config
///
/// Current configuration with provider credentials masked.
pub async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Config>>, ApiError> {
    let mut config = state.config().read().await.clone();

    if !config.metadata.tmdb_api_key.is_empty() {
        config.metadata.tmdb_api_key = MASK.to_string();
    }
    if !config.metadata.igdb_client_secret.is_empty() {
        config.metadata.igdb_client_secret = MASK.to_string();
    }

    Ok(Json(ApiResponse::success(config)))
}

/// PUT /system/config
///
/// Replaces and persists the configuration. Masked credential fields in
/// the payload keep their existing values.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(mut new_config): Json<Config>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let mut config = state.config().write().await;

    if new_config.metadata.tmdb_api_key == MASK {
        new_config.metadata.tmdb_api_key = config.metadata.tmdb_api_key.clone();
    }
    if new_config.metadata.igdb_client_secret == MASK {
        new_config.metadata.igdb_client_secret = config.metadata.igdb_client_secret.clone();
    }

    new_config
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    new_config
        .save()
        .map_err(|e| ApiError::internal(format!("Failed to save config: {e}")))?;

    *config = new_config;

    tracing::info!("Configuration updated");

    Ok(Json(ApiResponse::success(())))
}

/// GET /health
///
/// Liveness probe, reachable without authentication.
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse { status: "alive" }))
}
