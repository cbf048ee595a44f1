mod ai;
mod auth;
mod config;
mod errors;
mod feedback;
mod models;
mod render;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::ai::service::AiService;
use crate::config::Config;
use crate::render::PdftoppmRenderer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::files::S3FileStore;
use crate::storage::kv::RedisKv;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Resumind API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Redis
    let kv = RedisKv::connect(&config.redis_url, &config.kv_prefix).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let files = S3FileStore::new(s3, &config.s3_bucket);
    info!("S3 file store initialized (bucket: {})", config.s3_bucket);

    // Pick the AI backend (explicit AI_SERVICE, else bridge if detected, else hosted)
    let ai = AiService::from_config(&config);

    let renderer = PdftoppmRenderer::new(config.pdftoppm_path.clone());

    let state = AppState {
        kv: Arc::new(kv),
        files: Arc::new(files),
        renderer: Arc::new(renderer),
        ai,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "resumind-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
