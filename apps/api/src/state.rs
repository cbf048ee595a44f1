use std::sync::Arc;

use crate::ai::service::AiService;
use crate::config::Config;
use crate::feedback::analyze::AnalysisDeps;
use crate::render::PreviewRenderer;
use crate::storage::{FileStore, KvStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub files: Arc<dyn FileStore>,
    /// First-page PNG renderer. Default: `PdftoppmRenderer`.
    pub renderer: Arc<dyn PreviewRenderer>,
    /// Selector over the hosted and bridge AI backends.
    pub ai: AiService,
    pub config: Config,
}

impl AppState {
    pub fn analysis_deps(&self) -> AnalysisDeps<'_> {
        AnalysisDeps {
            kv: self.kv.as_ref(),
            files: self.files.as_ref(),
            renderer: self.renderer.as_ref(),
            ai: &self.ai,
            max_prompt_chars: self.config.prompt_max_chars,
        }
    }
}
