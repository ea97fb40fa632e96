use axum::{Json, extract::State};
use std::path::Path;
use std::sync::Arc;

use super::{
    ApiError, ApiResponse, AppState, ExportBackupRequest, ExportBackupResponse,
    ImportBackupRequest, ImportBackupResponse,
};
use crate::services::backup::BackupFile;
use crate::services::{ExportOptions, ImportOptions};

/// GET /backups
///
/// Archives in the configured backup directory, newest first.
pub async fn list_backups(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<BackupFile>>>, ApiError> {
    let backups = state
        .shared
        .backups
        .list(None)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to list backups: {e}")))?;

    Ok(Json(ApiResponse::success(backups)))
}

/// POST /backups
///
/// Runs an export now. Rotation only happens when `keep` is supplied.
pub async fn export_backup(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<ExportBackupRequest>>,
) -> Result<Json<ApiResponse<ExportBackupResponse>>, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    if let Some(filename) = &request.filename
        && (filename.contains('/') || filename.contains('\\'))
    {
        return Err(ApiError::validation(
            "Backup filename cannot contain path separators",
        ));
    }

    let options = ExportOptions {
        directory: None,
        filename: request.filename,
        keep: request.keep,
    };

    let report = state
        .shared
        .backups
        .export(&options)
        .await
        .map_err(|e| ApiError::internal(format!("Backup export failed: {e}")))?;

    Ok(Json(ApiResponse::success(ExportBackupResponse {
        path: report.path.display().to_string(),
        size_bytes: report.size_bytes,
        deleted: report.deleted,
    })))
}

/// POST /backups/import
///
/// Restores an archive from a server-side path. `flush` empties the
/// tables first; without it rows merge by primary key.
pub async fn import_backup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ImportBackupRequest>,
) -> Result<Json<ApiResponse<ImportBackupResponse>>, ApiError> {
    let path = Path::new(&payload.path);
    if !path.exists() {
        return Err(ApiError::not_found("Backup file", &payload.path));
    }
    if !payload.path.ends_with(".tar.gz") {
        return Err(ApiError::validation(format!(
            "Invalid backup file format. Expected .tar.gz, got: {}",
            payload.path
        )));
    }

    let options = ImportOptions {
        flush: payload.flush,
        skip_media: payload.skip_media,
    };

    let report = state
        .shared
        .backups
        .import(path, options)
        .await
        .map_err(|e| ApiError::internal(format!("Backup import failed: {e}")))?;

    Ok(Json(ApiResponse::success(ImportBackupResponse {
        created_at: report.created_at,
        restored_rows: report.restored_rows,
        media_files: report.media_files,
    })))
}
