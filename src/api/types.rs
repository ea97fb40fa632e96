use serde::{Deserialize, Serialize};

use crate::models::catalog::{Agent, EntityRef, MediaEntry};
use crate::models::filters::ActiveFilterLabels;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// One catalogue page plus everything the UI needs to render the filter
/// bar: active-filter labels, the echoed sort/view mode, and the agent the
/// listing was narrowed to.
#[derive(Debug, Serialize)]
pub struct MediaListResponse {
    pub items: Vec<MediaEntry>,
    pub page: u64,
    pub total_pages: u64,
    pub total_items: u64,
    pub sort: String,
    pub view_mode: String,
    pub active_filters: ActiveFilterLabels,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor: Option<Agent>,
}

/// Write payload for create and full-replace update. Enum fields arrive as
/// their wire codes and are parsed in the handler so bad values become 400s.
#[derive(Debug, Deserialize)]
pub struct MediaRequest {
    pub title: String,
    pub media_type: String,
    pub status: String,
    pub pub_year: Option<i32>,
    pub score: Option<i32>,
    #[serde(default)]
    pub review: String,
    pub review_date: Option<String>,
    #[serde(default)]
    pub contributors: Vec<EntityRef>,
    #[serde(default)]
    pub tags: Vec<EntityRef>,
}

#[derive(Debug, Deserialize)]
pub struct CoverFromUrlRequest {
    pub provider: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct CoverResponse {
    pub cover: String,
}

#[derive(Debug, Serialize)]
pub struct AgentDetailResponse {
    pub agent: Agent,
    pub media: Vec<MediaEntry>,
}

#[derive(Debug, Serialize)]
pub struct SavedViewDto {
    pub id: i32,
    pub name: String,
    pub query_string: String,
    pub view_mode: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveViewRequest {
    pub name: String,
    pub query_string: String,
    #[serde(default)]
    pub view_mode: String,
}

/// A recent-activity row joined with the media title for display.
#[derive(Debug, Serialize)]
pub struct RecentActivityDto {
    pub id: i32,
    pub media_id: i32,
    pub media_title: Option<String>,
    pub media_kind: String,
    pub status: String,
    pub score: Option<i32>,
    pub recorded_at: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub username: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub must_change_password: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportBackupRequest {
    pub filename: Option<String>,
    pub keep: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ExportBackupResponse {
    pub path: String,
    pub size_bytes: u64,
    pub deleted: usize,
}

#[derive(Debug, Deserialize)]
pub struct ImportBackupRequest {
    pub path: String,
    #[serde(default)]
    pub flush: bool,
    #[serde(default)]
    pub skip_media: bool,
}

#[derive(Debug, Serialize)]
pub struct ImportBackupResponse {
    pub created_at: Option<String>,
    pub restored_rows: u64,
    pub media_files: u64,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime: u64,
    pub database: bool,
    pub media_count: u64,
    pub agent_count: u64,
    pub tag_count: u64,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
