use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::ai::service::ServiceStatus;
use crate::ai::{AiResponse, ChatRequest, ImageSource, ServiceKind};
use crate::auth::RequireAuth;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Img2TxtResponse {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SetServiceRequest {
    pub service: ServiceKind,
}

#[derive(Debug, Default, Deserialize)]
pub struct InitHostedRequest {
    #[serde(default)]
    pub api_key: Option<String>,
}

/// POST /api/v1/ai/chat
pub async fn handle_chat(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<AiResponse>, AppError> {
    Ok(Json(state.ai.chat(req).await?))
}

/// POST /api/v1/ai/img2txt
/// Multipart: either a `url` field or an `image` file, plus optional `test_mode`.
pub async fn handle_img2txt(
    _auth: RequireAuth,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Img2TxtResponse>, AppError> {
    let mut image = None;
    let mut test_mode = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::from_multipart("Invalid multipart body", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "url" => {
                let url = field
                    .text()
                    .await
                    .map_err(|e| AppError::from_multipart("Invalid url field", e))?;
                image = Some(ImageSource::Url(url.trim().to_string()));
            }
            "image" => {
                let mime_type = field.content_type().unwrap_or("image/png").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::from_multipart("Failed to read image", e))?;
                image = Some(ImageSource::Blob { bytes, mime_type });
            }
            "test_mode" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::from_multipart("Invalid test_mode field", e))?;
                test_mode = matches!(value.trim(), "true" | "1");
            }
            _ => {}
        }
    }

    let image = image
        .filter(|i| !matches!(i, ImageSource::Url(u) if u.is_empty()))
        .ok_or_else(|| AppError::Validation("Provide an image file or a url".to_string()))?;
    let text = state.ai.img2txt(image, test_mode).await?;
    Ok(Json(Img2TxtResponse { text }))
}

/// GET /api/v1/ai/service
pub async fn handle_get_service(
    _auth: RequireAuth,
    State(state): State<AppState>,
) -> Json<ServiceStatus> {
    Json(state.ai.status())
}

/// PUT /api/v1/ai/service
pub async fn handle_set_service(
    _auth: RequireAuth,
    State(state): State<AppState>,
    Json(req): Json<SetServiceRequest>,
) -> Json<ServiceStatus> {
    state.ai.set_service_type(req.service);
    Json(state.ai.status())
}

/// POST /api/v1/ai/service/hosted
/// Rebuilds the hosted adapter, optionally with a new API key.
pub async fn handle_init_hosted(
    _auth: RequireAuth,
    State(state): State<AppState>,
    body: Option<Json<InitHostedRequest>>,
) -> Json<ServiceStatus> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    state.ai.init_hosted_adapter(req.api_key);
    Json(state.ai.status())
}
