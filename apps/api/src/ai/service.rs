//! Service selector: holds which backend is active and dispatches every AI call to it.
//!
//! `AiService` is a cheap cloneable handle carried in `AppState`. The lock is
//! only held long enough to clone the active backend out; it is never held
//! across an await.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info};

use crate::ai::bridge::{self, BridgeAdapter};
use crate::ai::hosted::{HostedAdapter, HostedSettings};
use crate::ai::{AiBackend, AiError, AiResponse, ChatRequest, ImageSource, ServiceKind};
use crate::config::Config;

struct Selector {
    active: ServiceKind,
    hosted: Option<Arc<dyn AiBackend>>,
    bridge: Option<Arc<dyn AiBackend>>,
}

/// Snapshot of the selector, as reported by `GET /api/v1/ai/service`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatus {
    pub active: ServiceKind,
    pub hosted_available: bool,
    pub bridge_available: bool,
}

#[derive(Clone)]
pub struct AiService {
    selector: Arc<RwLock<Selector>>,
    hosted_settings: HostedSettings,
}

impl AiService {
    /// Builds the service at startup: constructs the default hosted adapter,
    /// checks for a host bridge, and picks the active backend. An explicit
    /// `AI_SERVICE` wins; otherwise the bridge is used when detected.
    pub fn from_config(config: &Config) -> Self {
        let settings = HostedSettings {
            base_url: config.openrouter_base_url.clone(),
            api_key: config.openrouter_api_key.clone(),
            timeout: config.ai_http_timeout(),
        };
        let bridge = bridge::detect(config.bridge_url.as_deref(), settings.timeout)
            .map(|host| Arc::new(BridgeAdapter::new(host)) as Arc<dyn AiBackend>);

        let active = config.ai_service.unwrap_or(if bridge.is_some() {
            ServiceKind::Bridge
        } else {
            ServiceKind::Hosted
        });

        let service = Self::with_backends(active, None, bridge, settings);
        service.init_hosted_adapter(None);
        info!("AI service ready (active backend: {active})");
        service
    }

    /// Builds a service around explicit backends. Used by `from_config` and tests.
    pub fn with_backends(
        active: ServiceKind,
        hosted: Option<Arc<dyn AiBackend>>,
        bridge: Option<Arc<dyn AiBackend>>,
        hosted_settings: HostedSettings,
    ) -> Self {
        Self {
            selector: Arc::new(RwLock::new(Selector {
                active,
                hosted,
                bridge,
            })),
            hosted_settings,
        }
    }

    pub fn service_type(&self) -> ServiceKind {
        self.selector.read().active
    }

    pub fn set_service_type(&self, kind: ServiceKind) {
        let previous = std::mem::replace(&mut self.selector.write().active, kind);
        if previous != kind {
            info!("AI service switched from {previous} to {kind}");
        }
    }

    /// Constructs (or replaces) the hosted adapter, e.g. to rotate credentials.
    /// Without a key, the configured default key is used.
    pub fn init_hosted_adapter(&self, api_key: Option<String>) {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.hosted_settings.api_key.clone());
        let has_key = api_key.is_some();

        match HostedAdapter::new(&self.hosted_settings, api_key) {
            Ok(adapter) => {
                self.selector.write().hosted = Some(Arc::new(adapter));
                info!("Hosted AI adapter initialized (api key present: {has_key})");
            }
            Err(e) => {
                self.selector.write().hosted = None;
                error!("Failed to initialize hosted AI adapter: {e}");
            }
        }
    }

    pub fn status(&self) -> ServiceStatus {
        let selector = self.selector.read();
        ServiceStatus {
            active: selector.active,
            hosted_available: selector.hosted.is_some(),
            bridge_available: selector.bridge.is_some(),
        }
    }

    fn active_backend(&self) -> Result<Arc<dyn AiBackend>, AiError> {
        let selector = self.selector.read();
        let backend = match selector.active {
            ServiceKind::Hosted => selector.hosted.clone(),
            ServiceKind::Bridge => selector.bridge.clone(),
        };
        backend.ok_or_else(|| {
            error!("AI service not available: {}", selector.active);
            AiError::Unavailable(selector.active)
        })
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<AiResponse, AiError> {
        self.active_backend()?.chat(request).await
    }

    pub async fn feedback(&self, path: &str, prompt: &str) -> Result<AiResponse, AiError> {
        self.active_backend()?.feedback(path, prompt).await
    }

    pub async fn img2txt(&self, image: ImageSource, test_mode: bool) -> Result<String, AiError> {
        self.active_backend()?.img2txt(image, test_mode).await
    }
}
