use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::RequireAuth;
use crate::errors::AppError;
use crate::feedback::records::load_resumes;
use crate::models::resume::ResumeRecord;
use crate::state::AppState;
use crate::storage::files::UPLOAD_ROOT;
use crate::storage::{FileStore, FsItem, KvStore, StorageError};

#[derive(Debug, Serialize)]
pub struct DataSummary {
    pub files: Vec<FsItem>,
    pub resumes: Vec<ResumeRecord>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct WipeReport {
    pub files_deleted: usize,
    pub files_failed: usize,
}

/// Deletes every stored file, then flushes the key-value store.
///
/// A file that cannot be deleted is logged and skipped; the flush still runs.
pub async fn wipe_all(kv: &dyn KvStore, files: &dyn FileStore) -> Result<WipeReport, StorageError> {
    let items = files.read_dir(UPLOAD_ROOT).await?;
    let mut report = WipeReport {
        files_deleted: 0,
        files_failed: 0,
    };

    for item in &items {
        match files.delete(&item.path).await {
            Ok(()) => report.files_deleted += 1,
            Err(e) => {
                warn!(path = %item.path, error = %e, "Failed to delete file, skipping");
                report.files_failed += 1;
            }
        }
    }

    kv.flush().await?;
    info!(
        deleted = report.files_deleted,
        failed = report.files_failed,
        "App data wiped"
    );
    Ok(report)
}

/// GET /api/v1/data
pub async fn handle_get_data(
    _auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<DataSummary>, AppError> {
    let files = state.files.read_dir(UPLOAD_ROOT).await?;
    let resumes = load_resumes(state.kv.as_ref()).await?;
    Ok(Json(DataSummary { files, resumes }))
}

/// DELETE /api/v1/data
pub async fn handle_wipe_data(
    _auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<WipeReport>, AppError> {
    let report = wipe_all(state.kv.as_ref(), state.files.as_ref()).await?;
    Ok(Json(report))
}
