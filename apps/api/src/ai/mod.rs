/// AI backend layer: the single point of entry for every model call in Resumind.
///
/// ARCHITECTURAL RULE: No other module may talk to an AI provider directly.
/// Callers go through `service::AiService`, which dispatches to whichever
/// `AiBackend` is active (hosted gateway or host bridge).
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub mod bridge;
pub mod handlers;
pub mod hosted;
pub mod prompts;
pub mod service;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No API key configured for the hosted AI gateway")]
    MissingApiKey,

    #[error("AI provider returned no choices")]
    NoChoices,

    #[error("AI provider returned empty content")]
    EmptyContent,

    #[error("AI service '{0}' is not available")]
    Unavailable(ServiceKind),
}

/// Which backend serves AI calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    #[default]
    Hosted,
    Bridge,
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Hosted => f.write_str("hosted"),
            ServiceKind::Bridge => f.write_str("bridge"),
        }
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(ServiceKind::Hosted),
            "bridge" => Ok(ServiceKind::Bridge),
            other => Err(format!(
                "unknown AI service '{other}' (expected 'hosted' or 'bridge')"
            )),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Messages
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One part of a multi-part message. `File` parts reference a storage path
/// that only the host bridge can dereference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    File { path: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        ContentPart::File { path: path.into() }
    }
}

/// A non-empty, ordered list of content parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ContentPart>", into = "Vec<ContentPart>")]
pub struct ContentParts(Vec<ContentPart>);

impl ContentParts {
    pub fn new(parts: Vec<ContentPart>) -> Option<Self> {
        if parts.is_empty() {
            None
        } else {
            Some(Self(parts))
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ContentPart> {
        self.0.iter()
    }

    pub fn push(&mut self, part: ContentPart) {
        self.0.push(part);
    }
}

impl TryFrom<Vec<ContentPart>> for ContentParts {
    type Error = &'static str;

    fn try_from(parts: Vec<ContentPart>) -> Result<Self, Self::Error> {
        ContentParts::new(parts).ok_or("content parts must not be empty")
    }
}

impl From<ContentParts> for Vec<ContentPart> {
    fn from(parts: ContentParts) -> Self {
        parts.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(ContentParts),
}

impl MessageContent {
    /// The plain text of a message: the string itself, or the first text part.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(text.as_str()),
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: ContentParts) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Either a bare prompt or a fully specified conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatPrompt {
    Text(String),
    Messages(Vec<ChatMessage>),
}

impl ChatPrompt {
    /// A bare prompt becomes a single user message.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            ChatPrompt::Text(text) => vec![ChatMessage::user(text)],
            ChatPrompt::Messages(messages) => messages,
        }
    }
}

impl From<&str> for ChatPrompt {
    fn from(text: &str) -> Self {
        ChatPrompt::Text(text.to_string())
    }
}

impl From<String> for ChatPrompt {
    fn from(text: String) -> Self {
        ChatPrompt::Text(text)
    }
}

impl From<Vec<ChatMessage>> for ChatPrompt {
    fn from(messages: Vec<ChatMessage>) -> Self {
        ChatPrompt::Messages(messages)
    }
}

/// Per-call generation knobs. Unset fields fall back to adapter defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature in [0, 2].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub prompt: ChatPrompt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<ChatPrompt>) -> Self {
        Self {
            prompt: prompt.into(),
            image_url: None,
            test_mode: false,
            options: ChatOptions::default(),
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

/// Image input for text extraction: a URL, or raw bytes with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    Url(String),
    Blob { bytes: Bytes, mime_type: String },
}

impl ImageSource {
    /// URLs pass through; blobs become `data:` URLs.
    pub fn to_url(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::Blob { bytes, mime_type } => format!(
                "data:{};base64,{}",
                mime_type,
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Normalized response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub role: Role,
    pub content: MessageContent,
    #[serde(default)]
    pub refusal: Option<String>,
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub model: String,
    pub amount: u64,
    /// Always 0 for the hosted gateway: billing is not reported back.
    pub cost: f64,
}

/// The provider-agnostic response every adapter returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    #[serde(default)]
    pub index: u32,
    pub message: ResponseMessage,
    #[serde(
        default = "default_finish_reason",
        deserialize_with = "deserialize_finish_reason"
    )]
    pub finish_reason: String,
    #[serde(default)]
    pub usage: Vec<UsageEntry>,
    #[serde(default)]
    pub via_ai_chat_service: bool,
}

impl AiResponse {
    pub fn text(&self) -> Option<&str> {
        self.message.content.first_text()
    }
}

pub const DEFAULT_FINISH_REASON: &str = "stop";

fn default_finish_reason() -> String {
    DEFAULT_FINISH_REASON.to_string()
}

fn deserialize_finish_reason<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let reason: Option<String> = Option::deserialize(deserializer)?;
    Ok(reason
        .filter(|r| !r.is_empty())
        .unwrap_or_else(default_finish_reason))
}

// ────────────────────────────────────────────────────────────────────────────
// Backend contract
// ────────────────────────────────────────────────────────────────────────────

/// The capability contract every AI backend implements.
///
/// Failures come back as `Err` and are logged by the adapter before
/// returning; nothing here panics on provider errors. Callers must check the
/// result of every call.
#[async_trait]
pub trait AiBackend: Send + Sync {
    fn kind(&self) -> ServiceKind;

    async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError>;

    /// Requests feedback on the file at `path` using the fully assembled
    /// `prompt`. Backends that cannot read storage paths ignore `path`.
    async fn feedback(&self, path: &str, prompt: &str) -> Result<AiResponse, AiError>;

    async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, AiError>;
}

/// Logs a failed backend operation at the adapter boundary.
pub(crate) fn log_failure<T>(
    kind: ServiceKind,
    operation: &str,
    result: Result<T, AiError>,
) -> Result<T, AiError> {
    if let Err(e) = &result {
        tracing::error!(backend = %kind, operation, error = %e, "AI call failed");
    }
    result
}

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
