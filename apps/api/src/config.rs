use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::ai::hosted::DEFAULT_BASE_URL;
use crate::ai::ServiceKind;
use crate::feedback::truncate::DEFAULT_MAX_PROMPT_CHARS;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,
    /// Namespace for every key this service writes to Redis.
    pub kv_prefix: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    /// Optional: the hosted adapter is still built without it, calls then fail.
    pub openrouter_api_key: Option<String>,
    pub openrouter_base_url: String,
    /// Explicit backend choice; when unset startup detection decides.
    pub ai_service: Option<ServiceKind>,
    pub bridge_url: Option<String>,
    pub ai_http_timeout_secs: u64,
    pub prompt_max_chars: usize,
    /// When set, `/api/v1` requests must carry this bearer token.
    pub auth_token: Option<String>,
    pub pdftoppm_path: String,
    /// Body limit for multipart uploads (résumés and images).
    pub max_upload_bytes: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            redis_url: require_env("REDIS_URL")?,
            kv_prefix: optional_env("KV_PREFIX").unwrap_or_else(|| "resumind:".to_string()),
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            openrouter_api_key: optional_env("OPENROUTER_API_KEY"),
            openrouter_base_url: optional_env("OPENROUTER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            ai_service: optional_env("AI_SERVICE")
                .map(|s| s.parse::<ServiceKind>().map_err(|e| anyhow!(e)))
                .transpose()
                .context("AI_SERVICE must be 'hosted' or 'bridge'")?,
            bridge_url: optional_env("AI_BRIDGE_URL"),
            ai_http_timeout_secs: parse_env("AI_HTTP_TIMEOUT_SECS", 120)?,
            prompt_max_chars: parse_env("PROMPT_MAX_CHARS", DEFAULT_MAX_PROMPT_CHARS)?,
            auth_token: optional_env("APP_AUTH_TOKEN"),
            pdftoppm_path: optional_env("PDFTOPPM_PATH").unwrap_or_else(|| "pdftoppm".to_string()),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn ai_http_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_http_timeout_secs)
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Reads an optional variable; empty values count as unset.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Config {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            kv_prefix: "test:".to_string(),
            s3_bucket: "resumind-test".to_string(),
            s3_endpoint: "http://127.0.0.1:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_BASE_URL.to_string(),
            ai_service: None,
            bridge_url: None,
            ai_http_timeout_secs: 5,
            prompt_max_chars: DEFAULT_MAX_PROMPT_CHARS,
            auth_token: None,
            pdftoppm_path: "pdftoppm".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            port: 8080,
            rust_log: "info".to_string(),
        }
    }
}
