use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ai::AiError;
use crate::feedback::analyze::AnalysisError;
use crate::storage::StorageError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// `next` is the path the client should return to after signing in.
    #[error("Unauthenticated")]
    Unauthenticated { next: String },

    #[error("AI error: {0}")]
    Ai(#[from] AiError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Maps a multipart read failure, keeping axum's body-limit rejection as 413.
    pub fn from_multipart(context: &str, e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(format!("{context}: {}", e.body_text()))
        } else {
            AppError::Validation(format!("{context}: {}", e.body_text()))
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNPROCESSABLE_ENTITY",
                msg.clone(),
            ),
            AppError::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                msg.clone(),
            ),
            AppError::Unauthenticated { next } => {
                let body = Json(json!({
                    "error": {
                        "code": "UNAUTHENTICATED",
                        "message": "Authentication required",
                        "redirect": format!("/auth?next={}", urlencoding::encode(next))
                    }
                }));
                return (StatusCode::UNAUTHORIZED, body).into_response();
            }
            AppError::Ai(e) => {
                tracing::error!("AI error: {e}");
                let status = match e {
                    AiError::Unavailable(_) | AiError::MissingApiKey => {
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    _ => StatusCode::BAD_GATEWAY,
                };
                (status, "AI_ERROR", e.to_string())
            }
            AppError::Analysis(e) => {
                tracing::error!("Resume analysis failed: {e}");
                let status = match e {
                    AnalysisError::ConvertFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    AnalysisError::AnalysisFailed(_) | AnalysisError::FeedbackParse(_) => {
                        StatusCode::BAD_GATEWAY
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, "ANALYSIS_FAILED", e.status_message().to_string())
            }
            AppError::Storage(StorageError::NotFound(path)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Not found: {path}"),
            ),
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
