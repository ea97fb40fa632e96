use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::validate_limit;
use super::{AgentDetailResponse, ApiError, ApiResponse, AppState};
use crate::models::catalog::Agent;

#[derive(Debug, Deserialize)]
pub struct AgentSearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<u64>,
}

/// GET /agents
///
/// Case-insensitive name substring search; an empty query lists agents
/// alphabetically up to the limit.
pub async fn search_agents(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AgentSearchParams>,
) -> Result<Json<ApiResponse<Vec<Agent>>>, ApiError> {
    let limit = validate_limit(params.limit.unwrap_or(20))?;

    let agents = state
        .store()
        .search_agents(params.q.trim(), limit)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(agents)))
}

/// GET /agents/{id}
///
/// Agent detail with every catalogue entry they are credited on.
pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AgentDetailResponse>>, ApiError> {
    let agent = state
        .store()
        .get_agent(id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Agent", id))?;

    let media = state
        .store()
        .media_for_agent(id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(AgentDetailResponse {
        agent,
        media,
    })))
}
