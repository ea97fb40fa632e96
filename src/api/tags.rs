use axum::{Json, extract::State};
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::models::catalog::TagWithCount;

/// GET /tags
///
/// Every tag with its media count, alphabetical.
pub async fn list_tags(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<TagWithCount>>>, ApiError> {
    let tags = state
        .store()
        .list_tags()
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(tags)))
}
