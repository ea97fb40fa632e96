use axum::{Json, extract::State, http::HeaderMap};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::current_user;
use super::validation::validate_email;
use super::{ApiError, ApiResponse, AppState, ProfileResponse, UpdateProfileRequest};
use crate::db::User;

fn to_response(user: User) -> ProfileResponse {
    ProfileResponse {
        username: user.username,
        display_name: user.display_name,
        email: user.email,
        must_change_password: user.must_change_password,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

/// GET /profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let user = current_user(&state, &session, &headers).await?;
    Ok(Json(ApiResponse::success(to_response(user))))
}

/// PUT /profile
///
/// Updates display name and email. Empty strings clear the field.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<ProfileResponse>>, ApiError> {
    let user = current_user(&state, &session, &headers).await?;

    let display_name = payload
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let email = match payload.email.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(email) => Some(validate_email(email)?),
    };

    let updated = state
        .store()
        .update_user_profile(&user.username, display_name, email)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(to_response(updated))))
}
