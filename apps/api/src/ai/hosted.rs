//! Hosted-API adapter: talks to an OpenAI-compatible chat-completion gateway.
//!
//! The gateway cannot dereference storage paths, so `feedback` ignores the
//! path and relies on callers embedding the document text in the prompt.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::prompts::{file_placeholder, IMG2TXT_INSTRUCTION};
use crate::ai::{
    log_failure, AiBackend, AiError, AiResponse, ChatMessage, ChatOptions, ChatRequest,
    ContentPart, ContentParts, ImageSource, MessageContent, ResponseMessage, Role, ServiceKind,
    UsageEntry, DEFAULT_FINISH_REASON,
};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Default model for chat and feedback.
pub const DEFAULT_MODEL: &str = "anthropic/claude-3.7-sonnet";
/// Vision-capable model used for text extraction.
pub const VISION_MODEL: &str = "anthropic/claude-3.5-sonnet";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
const IMG2TXT_TEMPERATURE: f32 = 0.1;
const IMG2TXT_MAX_TOKENS: u32 = 2000;

/// Connection settings shared by every hosted adapter instance.
#[derive(Debug, Clone)]
pub struct HostedSettings {
    pub base_url: String,
    /// Key used when `init_hosted_adapter` is called without one.
    pub api_key: Option<String>,
    /// Transport timeout of the HTTP client.
    pub timeout: Duration,
}

impl Default for HostedSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    index: u32,
    message: CompletionMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default = "assistant_role")]
    role: Role,
    content: Option<MessageContent>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct GatewayError {
    error: GatewayErrorBody,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    message: String,
}

fn assistant_role() -> Role {
    Role::Assistant
}

impl CompletionResponse {
    /// Copies the first choice into the normalized shape. Refusal and
    /// annotations are never reported by the gateway; cost accounting is not
    /// implemented, so the single usage entry is always zero-cost.
    fn into_ai_response(self) -> Result<AiResponse, AiError> {
        let amount = self.usage.map(|u| u.total_tokens).unwrap_or(0);
        let choice = self.choices.into_iter().next().ok_or(AiError::NoChoices)?;

        Ok(AiResponse {
            index: choice.index,
            message: ResponseMessage {
                role: choice.message.role,
                content: choice
                    .message
                    .content
                    .unwrap_or_else(|| MessageContent::Text(String::new())),
                refusal: None,
                annotations: Vec::new(),
            },
            finish_reason: choice
                .finish_reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_FINISH_REASON.to_string()),
            usage: vec![UsageEntry {
                kind: "tokens".to_string(),
                model: self.model,
                amount,
                cost: 0.0,
            }],
            via_ai_chat_service: false,
        })
    }
}

/// Adapter over the hosted chat-completion gateway.
#[derive(Clone)]
pub struct HostedAdapter {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HostedAdapter {
    /// Builds the adapter. A missing API key is allowed; calls then fail with
    /// `AiError::MissingApiKey`.
    pub fn new(settings: &HostedSettings, api_key: Option<String>) -> Result<Self, AiError> {
        let client = Client::builder().timeout(settings.timeout).build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    async fn complete(&self, body: &CompletionRequest<'_>) -> Result<AiResponse, AiError> {
        let api_key = self.api_key.as_deref().ok_or(AiError::MissingApiKey)?;
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).into_owned();
            let message = serde_json::from_str::<GatewayError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: CompletionResponse = serde_json::from_slice(&bytes)?;
        debug!(
            "Gateway call succeeded: model={}, choices={}",
            completion.model,
            completion.choices.len()
        );

        completion.into_ai_response()
    }

    async fn try_chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
        let ChatRequest {
            prompt,
            image_url,
            test_mode,
            options,
        } = request;

        if test_mode {
            debug!("test_mode has no effect on the hosted gateway");
        }
        if options.stream.unwrap_or(false) {
            debug!("streaming is not supported by the hosted adapter; sending a buffered request");
        }

        let messages = prepare_messages(prompt.into_messages(), image_url);
        let (model, temperature, max_tokens) = resolve_options(&options);

        self.complete(&CompletionRequest {
            model: &model,
            messages: &messages,
            temperature,
            max_tokens,
        })
        .await
    }

    async fn try_img2txt(&self, image: ImageSource) -> Result<String, AiError> {
        let parts = vec![
            ContentPart::text(IMG2TXT_INSTRUCTION),
            ContentPart::image(image.to_url()),
        ];
        let messages = [ChatMessage::user_parts(
            ContentParts::new(parts).ok_or(AiError::EmptyContent)?,
        )];

        let response = self
            .complete(&CompletionRequest {
                model: VISION_MODEL,
                messages: &messages,
                temperature: IMG2TXT_TEMPERATURE,
                max_tokens: IMG2TXT_MAX_TOKENS,
            })
            .await?;

        response
            .text()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or(AiError::EmptyContent)
    }
}

#[async_trait]
impl AiBackend for HostedAdapter {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Hosted
    }

    async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
        log_failure(self.kind(), "chat", self.try_chat(request).await)
    }

    async fn feedback(&self, _path: &str, prompt: &str) -> Result<AiResponse, AiError> {
        let messages = feedback_messages(prompt);
        let result = self
            .complete(&CompletionRequest {
                model: DEFAULT_MODEL,
                messages: &messages,
                temperature: DEFAULT_TEMPERATURE,
                max_tokens: DEFAULT_MAX_TOKENS,
            })
            .await;
        log_failure(self.kind(), "feedback", result)
    }

    async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, AiError> {
        if test_mode {
            debug!("test_mode has no effect on the hosted gateway");
        }
        log_failure(self.kind(), "img2txt", self.try_img2txt(image).await)
    }
}

/// The feedback request is the assembled prompt alone; the storage path never
/// reaches the gateway.
fn feedback_messages(prompt: &str) -> [ChatMessage; 1] {
    [ChatMessage::user(prompt)]
}

fn resolve_options(options: &ChatOptions) -> (String, f32, u32) {
    let model = options
        .model
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    let temperature = options
        .temperature
        .unwrap_or(DEFAULT_TEMPERATURE)
        .clamp(0.0, 2.0);
    let max_tokens = options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
    (model, temperature, max_tokens)
}

/// Rewrites messages into what the gateway accepts: file parts become text
/// placeholders, and an image URL is appended to the last message when it
/// comes from the user.
fn prepare_messages(messages: Vec<ChatMessage>, image_url: Option<String>) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = messages
        .into_iter()
        .map(|message| ChatMessage {
            role: message.role,
            content: replace_file_parts(message.content),
        })
        .collect();

    if let Some(url) = image_url {
        if let Some(last) = messages.last_mut().filter(|m| m.role == Role::User) {
            let content = std::mem::replace(&mut last.content, MessageContent::Text(String::new()));
            last.content = match content {
                MessageContent::Text(text) => MessageContent::Parts(ContentParts(vec![
                    ContentPart::text(text),
                    ContentPart::image(url),
                ])),
                MessageContent::Parts(mut parts) => {
                    parts.push(ContentPart::image(url));
                    MessageContent::Parts(parts)
                }
            };
        }
    }

    messages
}

fn replace_file_parts(content: MessageContent) -> MessageContent {
    match content {
        MessageContent::Text(text) => MessageContent::Text(text),
        MessageContent::Parts(parts) => MessageContent::Parts(ContentParts(
            Vec::from(parts)
                .into_iter()
                .map(|part| match part {
                    ContentPart::File { path } => ContentPart::text(file_placeholder(&path)),
                    other => other,
                })
                .collect(),
        )),
    }
}
