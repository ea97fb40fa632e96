use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::current_user;
use super::validation::validate_view_name;
use super::{ApiError, ApiResponse, AppState, SaveViewRequest, SavedViewDto};
use crate::db::SavedView;
use crate::models::filters::{MediaQuery, ViewMode};

fn to_dto(view: SavedView) -> SavedViewDto {
    SavedViewDto {
        id: view.id,
        name: view.name,
        query_string: view.query_string,
        view_mode: view.view_mode,
        created_at: view.created_at,
    }
}

/// GET /views
pub async fn list_views(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<SavedViewDto>>>, ApiError> {
    let user = current_user(&state, &session, &headers).await?;

    let views = state
        .store()
        .list_saved_views(user.id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(
        views.into_iter().map(to_dto).collect(),
    )))
}

/// POST /views
///
/// Persists the submitted filter state under a name. The query string is
/// re-parsed and rebuilt so only whitelisted parameters are stored.
pub async fn create_view(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Json(payload): Json<SaveViewRequest>,
) -> Result<Json<ApiResponse<SavedViewDto>>, ApiError> {
    let user = current_user(&state, &session, &headers).await?;
    let name = validate_view_name(&payload.name)?;

    let existing = state
        .store()
        .find_saved_view_by_name(user.id, name)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
    if existing.is_some() {
        return Err(ApiError::Conflict(format!(
            "A view named '{}' already exists",
            name
        )));
    }

    let query = MediaQuery::parse(&payload.query_string);
    let view_mode = if payload.view_mode.is_empty() {
        query.view_mode
    } else {
        ViewMode::parse(&payload.view_mode)
    };

    let view = state
        .store()
        .create_saved_view(user.id, name, &query.to_query_string(), view_mode.as_str())
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    tracing::info!(user = %user.username, name = %view.name, "Saved view created");

    Ok(Json(ApiResponse::success(to_dto(view))))
}

/// DELETE /views/{id}
pub async fn delete_view(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let user = current_user(&state, &session, &headers).await?;

    let deleted = state
        .store()
        .delete_saved_view(user.id, id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    if !deleted {
        return Err(ApiError::not_found("Saved view", id));
    }

    Ok(Json(ApiResponse::success(())))
}
