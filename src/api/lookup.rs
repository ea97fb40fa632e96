use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use super::{ApiError, ApiResponse, AppState};
use crate::clients::{LookupDetails, LookupResult};
use crate::services::Provider;

#[derive(Debug, Deserialize)]
pub struct LookupSearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct LookupDetailsParams {
    pub year: Option<i32>,
}

fn resolve_provider(state: &Arc<AppState>, raw: &str) -> Result<Provider, ApiError> {
    let provider = Provider::parse(raw)
        .ok_or_else(|| ApiError::validation(format!("Unknown provider: {}", raw)))?;

    if !state.shared.lookup.is_configured(provider) {
        return Err(ApiError::provider_error(
            provider.label(),
            "API credentials are not configured",
        ));
    }

    Ok(provider)
}

/// GET /lookup/{provider}/search?q=
///
/// External catalogue search. Queries under two characters return an
/// empty list without contacting the provider.
pub async fn search(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(params): Query<LookupSearchParams>,
) -> Result<Json<ApiResponse<Vec<LookupResult>>>, ApiError> {
    let provider = resolve_provider(&state, &provider)?;

    let results = state
        .shared
        .lookup
        .search(provider, params.q.trim())
        .await
        .map_err(|e| ApiError::provider_error(provider.label(), e.to_string()))?;

    Ok(Json(ApiResponse::success(results)))
}

/// GET /lookup/{provider}/items/{id}?year=
///
/// Detail fetch for one provider item. The optional year is a hint for
/// providers whose detail payloads omit it (OpenLibrary works).
pub async fn details(
    State(state): State<Arc<AppState>>,
    Path((provider, id)): Path<(String, String)>,
    Query(params): Query<LookupDetailsParams>,
) -> Result<Json<ApiResponse<LookupDetails>>, ApiError> {
    let provider = resolve_provider(&state, &provider)?;

    let details = state
        .shared
        .lookup
        .details(provider, &id, params.year)
        .await
        .map_err(|e| ApiError::provider_error(provider.label(), e.to_string()))?
        .ok_or_else(|| ApiError::not_found("Lookup item", &id))?;

    Ok(Json(ApiResponse::success(details)))
}
