use axum::{
    Json,
    extract::{Multipart, Path, RawQuery, State},
};
use std::sync::Arc;

use super::validation::{
    validate_media_id, validate_media_type, validate_pub_year, validate_review_date,
    validate_score, validate_status, validate_title,
};
use super::{
    ApiError, ApiResponse, AppState, CoverFromUrlRequest, CoverResponse, MediaListResponse,
    MediaRequest,
};
use crate::db::Activity;
use crate::models::catalog::{EntityRef, MediaEntry, MediaInput};
use crate::models::filters::MediaQuery;
use crate::services::{Provider, markdown};

/// GET /media
///
/// Filterable, sorted, paginated catalogue listing. The query string is
/// parsed manually because `type`, `status` and `score` repeat.
pub async fn list_media(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
) -> Result<Json<ApiResponse<MediaListResponse>>, ApiError> {
    let query = MediaQuery::parse(raw.as_deref().unwrap_or_default());

    let page = state
        .store()
        .list_media(&query)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(MediaListResponse {
        items: page.entries,
        page: page.page,
        total_pages: page.total_pages,
        total_items: page.total_items,
        sort: query.sort.as_param(),
        view_mode: query.view_mode.as_str().to_string(),
        active_filters: query.active_filter_labels(),
        contributor: page.contributor,
    })))
}

/// POST /media
pub async fn create_media(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MediaRequest>,
) -> Result<Json<ApiResponse<MediaEntry>>, ApiError> {
    let input = build_media_input(payload)?;
    ensure_known_refs(&state, &input).await?;

    let entry = state
        .store()
        .create_media(&input)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    tracing::info!(id = entry.id, title = %entry.title, "Media entry created");

    Ok(Json(ApiResponse::success(entry)))
}

/// GET /media/{id}
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MediaEntry>>, ApiError> {
    validate_media_id(id)?;

    let entry = state
        .store()
        .get_media(id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::media_not_found(id))?;

    Ok(Json(ApiResponse::success(entry)))
}

/// PUT /media/{id}
///
/// Full replace. Agents and tags detached by the edit are deleted when
/// this was their last entry.
pub async fn update_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<MediaRequest>,
) -> Result<Json<ApiResponse<MediaEntry>>, ApiError> {
    validate_media_id(id)?;
    let input = build_media_input(payload)?;
    ensure_known_refs(&state, &input).await?;

    let entry = state
        .store()
        .update_media(id, &input)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::media_not_found(id))?;

    Ok(Json(ApiResponse::success(entry)))
}

/// DELETE /media/{id}
///
/// Removes the row, prunes orphaned agents/tags, and deletes the cover
/// file from disk.
pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate_media_id(id)?;

    let deleted = state
        .store()
        .delete_media(id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::media_not_found(id))?;

    if let Some(cover) = &deleted.cover
        && let Err(e) = state.shared.covers.remove(cover).await
    {
        tracing::warn!(cover = %cover, "Failed to delete cover file: {e}");
    }

    tracing::info!(id, title = %deleted.title, "Media entry deleted");

    Ok(Json(ApiResponse::success(())))
}

/// POST /media/{id}/cover
///
/// Multipart upload. The image is validated, orientation-corrected,
/// downscaled to fit 800x800 and re-encoded as JPEG in a blocking task.
pub async fn upload_cover(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<CoverResponse>>, ApiError> {
    validate_media_id(id)?;
    ensure_media_exists(&state, id).await?;

    let mut bytes: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart payload: {e}")))?
    {
        if field.name() == Some("file") || field.file_name().is_some() {
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Failed to read upload: {e}")))?;
            bytes = Some(data.to_vec());
            break;
        }
    }

    let bytes = bytes.ok_or_else(|| ApiError::validation("No file field in upload"))?;

    store_cover(&state, id, bytes).await
}

/// POST /media/{id}/cover/from-url
///
/// Downloads cover art through the named provider's client, which refuses
/// URLs outside that provider's own image host.
pub async fn cover_from_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(payload): Json<CoverFromUrlRequest>,
) -> Result<Json<ApiResponse<CoverResponse>>, ApiError> {
    validate_media_id(id)?;
    ensure_media_exists(&state, id).await?;

    let provider = Provider::parse(&payload.provider)
        .ok_or_else(|| ApiError::validation(format!("Unknown provider: {}", payload.provider)))?;

    let bytes = state
        .shared
        .lookup
        .download_cover(provider, &payload.url)
        .await
        .map_err(|e| ApiError::provider_error(provider.label(), e.to_string()))?
        .ok_or_else(|| {
            ApiError::NotFound(format!("No cover available at {}", payload.url))
        })?;

    store_cover(&state, id, bytes).await
}

/// DELETE /media/{id}/cover
pub async fn delete_cover(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    validate_media_id(id)?;

    let entry = state
        .store()
        .get_media(id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::media_not_found(id))?;

    if let Some(cover) = &entry.cover {
        state
            .shared
            .covers
            .remove(cover)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to delete cover file: {e}")))?;
        state
            .store()
            .set_media_cover(id, None)
            .await
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
    }

    Ok(Json(ApiResponse::success(())))
}

/// GET /media/{id}/activity
pub async fn media_activity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<Activity>>>, ApiError> {
    validate_media_id(id)?;
    ensure_media_exists(&state, id).await?;

    let rows = state
        .store()
        .media_activity(id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(rows)))
}

async fn store_cover(
    state: &Arc<AppState>,
    id: i32,
    bytes: Vec<u8>,
) -> Result<Json<ApiResponse<CoverResponse>>, ApiError> {
    let cover = state
        .shared
        .covers
        .store(id, bytes)
        .await
        .map_err(|e| ApiError::validation(e.to_string()))?;

    state
        .store()
        .set_media_cover(id, Some(&cover))
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    Ok(Json(ApiResponse::success(CoverResponse { cover })))
}

async fn ensure_media_exists(state: &Arc<AppState>, id: i32) -> Result<(), ApiError> {
    state
        .store()
        .get_media(id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .map(|_| ())
        .ok_or_else(|| ApiError::media_not_found(id))
}

/// Validate the write payload and turn it into the storage model,
/// rendering the review markdown once here.
fn build_media_input(payload: MediaRequest) -> Result<MediaInput, ApiError> {
    let title = validate_title(&payload.title)?.to_string();
    let media_type = validate_media_type(&payload.media_type)?;
    let status = validate_status(&payload.status)?;
    let pub_year = validate_pub_year(payload.pub_year)?;
    let score = validate_score(payload.score)?;
    let review_date = validate_review_date(payload.review_date.as_deref())?;

    let review = payload.review.trim().to_string();
    let review_html = markdown::render(&review);

    Ok(MediaInput {
        title,
        media_type,
        status,
        pub_year,
        score,
        review,
        review_html,
        review_date,
        contributors: payload.contributors,
        tags: payload.tags,
    })
}

/// Id references must point at existing rows; names are created on write.
async fn ensure_known_refs(state: &Arc<AppState>, input: &MediaInput) -> Result<(), ApiError> {
    for reference in &input.contributors {
        if let EntityRef::Id(id) = reference {
            let known = state
                .store()
                .get_agent(*id)
                .await
                .map_err(|e| ApiError::DatabaseError(e.to_string()))?
                .is_some();
            if !known {
                return Err(ApiError::validation(format!("Unknown agent id: {}", id)));
            }
        }
    }

    for reference in &input.tags {
        if let EntityRef::Id(id) = reference {
            let known = state
                .store()
                .get_tag(*id)
                .await
                .map_err(|e| ApiError::DatabaseError(e.to_string()))?
                .is_some();
            if !known {
                return Err(ApiError::validation(format!("Unknown tag id: {}", id)));
            }
        }
    }

    Ok(())
}
