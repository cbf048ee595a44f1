//! Bearer-token gate for the `/api/v1` routes.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::errors::AppError;
use crate::state::AppState;

/// Extractor that rejects unauthenticated requests.
///
/// With no `APP_AUTH_TOKEN` configured every request passes.
pub struct RequireAuth;

pub fn is_authenticated(expected: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = expected else {
        return true;
    };
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected)
}

#[async_trait]
impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if is_authenticated(state.config.auth_token.as_deref(), &parts.headers) {
            Ok(RequireAuth)
        } else {
            Err(AppError::Unauthenticated {
                next: parts.uri.path().to_string(),
            })
        }
    }
}
