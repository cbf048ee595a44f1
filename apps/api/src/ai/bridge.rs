//! Bridge adapter: forwards calls to an AI capability provided by the host runtime.
//!
//! The host resolves storage paths itself, so feedback requests reference the
//! uploaded file directly instead of embedding its text.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::{
    log_failure, AiBackend, AiError, AiResponse, ChatMessage, ChatOptions, ChatRequest,
    ContentPart, ContentParts, ImageSource, ServiceKind,
};

/// Model the host runs feedback requests on.
pub const BRIDGE_FEEDBACK_MODEL: &str = "claude-3-7-sonnet";

/// The host runtime's AI capability.
#[async_trait]
pub trait HostBridge: Send + Sync {
    async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError>;

    async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, AiError>;
}

/// Detects a host bridge. The host is present when it advertises an endpoint.
pub fn detect(bridge_url: Option<&str>, timeout: Duration) -> Option<Arc<dyn HostBridge>> {
    let url = bridge_url.map(str::trim).filter(|u| !u.is_empty())?;
    match HttpHostBridge::new(url, timeout) {
        Ok(bridge) => {
            info!("Host AI bridge detected at {url}");
            Some(Arc::new(bridge))
        }
        Err(e) => {
            tracing::error!("Host AI bridge at {url} could not be initialized: {e}");
            None
        }
    }
}

/// Host bridge reached over a local HTTP endpoint.
pub struct HttpHostBridge {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct Img2TxtBody<'a> {
    image: &'a str,
    test_mode: bool,
}

#[derive(Debug, Deserialize)]
struct Img2TxtReply {
    text: Option<String>,
}

impl HttpHostBridge {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AiError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Vec<u8>, AiError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(AiError::Api {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl HostBridge for HttpHostBridge {
    async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
        let bytes = self.post("/ai/chat", &request).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, AiError> {
        let url = image.to_url();
        let bytes = self
            .post(
                "/ai/img2txt",
                &Img2TxtBody {
                    image: &url,
                    test_mode,
                },
            )
            .await?;
        let reply: Img2TxtReply = serde_json::from_slice(&bytes)?;
        reply
            .text
            .filter(|t| !t.is_empty())
            .ok_or(AiError::EmptyContent)
    }
}

/// Adapter over a `HostBridge`.
#[derive(Clone)]
pub struct BridgeAdapter {
    host: Arc<dyn HostBridge>,
}

impl BridgeAdapter {
    pub fn new(host: Arc<dyn HostBridge>) -> Self {
        Self { host }
    }

    async fn forward_chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
        let mut response = self.host.chat(request).await?;
        response.via_ai_chat_service = true;
        Ok(response)
    }
}

/// One user message pairing the stored file with the instruction text.
fn feedback_request(path: &str, prompt: &str) -> ChatRequest {
    let parts = ContentParts(vec![ContentPart::file(path), ContentPart::text(prompt)]);
    ChatRequest::new(vec![ChatMessage::user_parts(parts)]).with_options(ChatOptions {
        model: Some(BRIDGE_FEEDBACK_MODEL.to_string()),
        ..ChatOptions::default()
    })
}

#[async_trait]
impl AiBackend for BridgeAdapter {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Bridge
    }

    async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
        log_failure(self.kind(), "chat", self.forward_chat(request).await)
    }

    async fn feedback(&self, path: &str, prompt: &str) -> Result<AiResponse, AiError> {
        let result = self.forward_chat(feedback_request(path, prompt)).await;
        log_failure(self.kind(), "feedback", result)
    }

    async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, AiError> {
        let result = self.host.img2txt(image, test_mode).await;
        log_failure(self.kind(), "img2txt", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MessageContent, ResponseMessage, Role};
    use axum::{routing::post, Json, Router};
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct RecordingHost {
        requests: Mutex<Vec<ChatRequest>>,
    }

    #[async_trait]
    impl HostBridge for RecordingHost {
        async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
            self.requests.lock().push(request);
            Ok(AiResponse {
                index: 0,
                message: ResponseMessage {
                    role: Role::Assistant,
                    content: MessageContent::Text("{}".to_string()),
                    refusal: None,
                    annotations: vec![],
                },
                finish_reason: "stop".to_string(),
                usage: vec![],
                via_ai_chat_service: false,
            })
        }

        async fn img2txt(&self, _image: ImageSource, _test_mode: bool) -> Result<String, AiError> {
            Err(AiError::Api {
                status: 503,
                message: "host busy".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_feedback_references_file_path() {
        let host = Arc::new(RecordingHost::default());
        let bridge = BridgeAdapter::new(host.clone());

        let response = bridge
            .feedback("uploads/1/resume.pdf", "Score this resume")
            .await
            .unwrap();
        assert!(response.via_ai_chat_service);

        let requests = host.requests.lock();
        let request = &requests[0];
        assert_eq!(request.options.model.as_deref(), Some(BRIDGE_FEEDBACK_MODEL));
        assert_eq!(
            serde_json::to_value(&request.prompt).unwrap(),
            json!([{
                "role": "user",
                "content": [
                    {"type": "file", "path": "uploads/1/resume.pdf"},
                    {"type": "text", "text": "Score this resume"}
                ]
            }])
        );
    }

    #[tokio::test]
    async fn test_chat_forwards_request_verbatim() {
        let host = Arc::new(RecordingHost::default());
        let bridge = BridgeAdapter::new(host.clone());
        let request = ChatRequest::new("hello").with_image("https://img/a.png");

        bridge.chat(request.clone()).await.unwrap();
        assert_eq!(host.requests.lock()[0], request);
    }

    #[tokio::test]
    async fn test_host_failure_is_err() {
        let bridge = BridgeAdapter::new(Arc::new(RecordingHost::default()));
        let result = bridge
            .img2txt(ImageSource::Url("https://img".to_string()), true)
            .await;
        assert!(matches!(result, Err(AiError::Api { status: 503, .. })));
    }

    #[test]
    fn test_detect_requires_url() {
        assert!(detect(None, Duration::from_secs(1)).is_none());
        assert!(detect(Some("  "), Duration::from_secs(1)).is_none());
        assert!(detect(Some("http://127.0.0.1:4100"), Duration::from_secs(1)).is_some());
    }

    #[tokio::test]
    async fn test_http_bridge_round_trip() {
        async fn chat(Json(body): Json<Value>) -> Json<Value> {
            Json(json!({
                "index": 0,
                "message": {"role": "assistant", "content": body["prompt"].clone()},
                "usage": [{"type": "tokens", "model": "claude-3-7-sonnet", "amount": 3, "cost": 0.01}]
            }))
        }
        async fn img2txt(Json(body): Json<Value>) -> Json<Value> {
            Json(json!({"text": format!("text of {}", body["image"].as_str().unwrap_or(""))}))
        }

        let app = Router::new()
            .route("/ai/chat", post(chat))
            .route("/ai/img2txt", post(img2txt));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let host = HttpHostBridge::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        let bridge = BridgeAdapter::new(Arc::new(host));

        let response = bridge.chat(ChatRequest::new("echo me")).await.unwrap();
        assert_eq!(response.text(), Some("echo me"));
        assert_eq!(response.finish_reason, "stop");
        assert!(response.via_ai_chat_service);
        assert_eq!(response.usage[0].amount, 3);

        let text = bridge
            .img2txt(ImageSource::Url("https://img/1.png".to_string()), false)
            .await
            .unwrap();
        assert_eq!(text, "text of https://img/1.png");
    }
}
