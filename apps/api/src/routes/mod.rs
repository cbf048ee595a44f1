pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::ai::handlers as ai;
use crate::feedback::handlers as resumes;
use crate::state::AppState;
use crate::storage::handlers as data;

pub fn build_router(state: AppState) -> Router {
    // multipart routes use the configured limit instead of axum's 2 MiB default
    let upload_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        .route("/health", get(health::health_handler))
        // Resumes
        .route(
            "/api/v1/resumes",
            post(resumes::handle_create_resume)
                .layer(upload_limit.clone())
                .get(resumes::handle_list_resumes),
        )
        .route("/api/v1/resumes/:id", get(resumes::handle_get_resume))
        // App data
        .route(
            "/api/v1/data",
            get(data::handle_get_data).delete(data::handle_wipe_data),
        )
        // AI service
        .route("/api/v1/ai/chat", post(ai::handle_chat))
        .route(
            "/api/v1/ai/img2txt",
            post(ai::handle_img2txt).layer(upload_limit),
        )
        .route(
            "/api/v1/ai/service",
            get(ai::handle_get_service).put(ai::handle_set_service),
        )
        .route("/api/v1/ai/service/hosted", post(ai::handle_init_hosted))
        .with_state(state)
}
