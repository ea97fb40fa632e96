use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::state::SharedState;

mod activity;
mod agents;
mod assets;
pub mod auth;
mod backups;
mod error;
mod lookup;
mod media;
mod observability;
mod partials;
mod profile;
mod system;
mod tags;
mod types;
mod validation;
mod views;

pub use error::ApiError;
pub use types::*;

/// Extra slack on top of the cover byte cap for multipart framing.
const UPLOAD_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &crate::db::Store {
        &self.shared.store
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub async fn router(state: Arc<AppState>) -> Router {
    let (media_path, cors_origins, secure_cookies, max_cover_bytes) = {
        let config = state.config().read().await;
        (
            config.general.media_path.clone(),
            config.server.cors_allowed_origins.clone(),
            config.server.secure_cookies,
            config.general.max_cover_bytes,
        )
    };

    // One session store shared between the JSON API and the HTML
    // fragments, so a browser login covers both.
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(60)));

    let api_router = Router::new()
        .merge(create_protected_router(state.clone()))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/health", get(system::health))
        .with_state(state.clone());

    let partials_router = create_partials_router(state.clone()).with_state(state.clone());

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .nest("/partials", partials_router)
        .layer(session_layer)
        .nest_service("/media", ServeDir::new(media_path))
        .fallback(assets::serve_asset)
        .layer(DefaultBodyLimit::max(
            max_cover_bytes.saturating_add(UPLOAD_OVERHEAD_BYTES),
        ))
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
        .layer(middleware::from_fn(
            observability::security_headers_middleware,
        ))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/media", get(media::list_media))
        .route("/media", post(media::create_media))
        .route("/media/{id}", get(media::get_media))
        .route("/media/{id}", put(media::update_media))
        .route("/media/{id}", delete(media::delete_media))
        .route("/media/{id}/cover", post(media::upload_cover))
        .route("/media/{id}/cover", delete(media::delete_cover))
        .route("/media/{id}/cover/from-url", post(media::cover_from_url))
        .route("/media/{id}/activity", get(media::media_activity))
        .route("/activity", get(activity::recent_activity))
        .route("/agents", get(agents::search_agents))
        .route("/agents/{id}", get(agents::get_agent))
        .route("/tags", get(tags::list_tags))
        .route("/views", get(views::list_views))
        .route("/views", post(views::create_view))
        .route("/views/{id}", delete(views::delete_view))
        .route("/lookup/{provider}/search", get(lookup::search))
        .route("/lookup/{provider}/items/{id}", get(lookup::details))
        .route("/backups", get(backups::list_backups))
        .route("/backups", post(backups::export_backup))
        .route("/backups/import", post(backups::import_backup))
        .route("/system/status", get(system::get_status))
        .route("/system/config", get(system::get_config))
        .route("/system/config", put(system::update_config))
        .route("/auth/me", get(auth::get_current_user))
        .route("/auth/password", put(auth::change_password))
        .route("/auth/api-key", get(auth::get_api_key))
        .route("/auth/api-key/regenerate", post(auth::regenerate_api_key))
        .route("/profile", get(profile::get_profile))
        .route("/profile", put(profile::update_profile))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}

fn create_partials_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/media", get(partials::media_fragment))
        .route("/agents/search", get(partials::agent_suggestions))
        .route("/agents/select", post(partials::agent_select))
        .route("/validate/media", post(partials::validate_media_field))
        .route("/validate/profile", post(partials::validate_profile_field))
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
