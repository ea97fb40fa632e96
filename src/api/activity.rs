use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::validate_limit;
use super::{ApiError, ApiResponse, AppState, RecentActivityDto};

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub limit: Option<u64>,
}

/// GET /activity
///
/// Most recent engagement changes across the catalogue, newest first.
pub async fn recent_activity(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ActivityParams>,
) -> Result<Json<ApiResponse<Vec<RecentActivityDto>>>, ApiError> {
    let limit = validate_limit(params.limit.unwrap_or(20))?;

    let rows = state
        .store()
        .recent_activity(limit)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let items = rows
        .into_iter()
        .map(|(activity, media)| RecentActivityDto {
            id: activity.id,
            media_id: activity.media_id,
            media_title: media.map(|m| m.title),
            media_kind: activity.media_kind,
            status: activity.status,
            score: activity.score,
            recorded_at: activity.recorded_at,
        })
        .collect();

    Ok(Json(ApiResponse::success(items)))
}
