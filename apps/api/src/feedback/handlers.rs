use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;

use crate::auth::RequireAuth;
use crate::errors::AppError;
use crate::feedback::analyze::{analyze_resume, ResumeSubmission};
use crate::feedback::records::{load_record, load_resumes};
use crate::models::resume::ResumeRecord;
use crate::storage::UploadFile;
use crate::state::AppState;

/// Reads the upload form: `company-name`, `job-title`, `job-description`, `file`.
async fn read_submission(mut multipart: Multipart) -> Result<ResumeSubmission, AppError> {
    let mut company_name = String::new();
    let mut job_title = String::new();
    let mut job_description = String::new();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_multipart("Invalid multipart body", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("resume.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::from_multipart("Failed to read file", e))?;
                file = Some(UploadFile {
                    name: file_name,
                    bytes,
                    content_type,
                });
            }
            "company-name" | "job-title" | "job-description" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::from_multipart(&format!("Invalid field {name}"), e))?;
                match name.as_str() {
                    "company-name" => company_name = value,
                    "job-title" => job_title = value,
                    _ => job_description = value,
                }
            }
            _ => {}
        }
    }

    let file = file
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| AppError::Validation("A resume file is required".to_string()))?;

    Ok(ResumeSubmission {
        company_name,
        job_title,
        job_description,
        file,
    })
}

/// POST /api/v1/resumes
/// Uploads a résumé, runs the analysis flow and returns the stored record.
pub async fn handle_create_resume(
    _auth: RequireAuth,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeRecord>), AppError> {
    let submission = read_submission(multipart).await?;
    let record = analyze_resume(&state.analysis_deps(), submission, |status| {
        info!(status = ?status, "{}", status.message());
    })
    .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    _auth: RequireAuth,
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeRecord>>, AppError> {
    Ok(Json(load_resumes(state.kv.as_ref()).await?))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeRecord>, AppError> {
    load_record(state.kv.as_ref(), id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}
