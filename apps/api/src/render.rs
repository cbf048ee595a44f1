//! First-page preview rendering for uploaded résumés.
//!
//! The production renderer shells out to poppler's `pdftoppm`. The analysis
//! flow only sees the `PreviewRenderer` trait.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Resolution of the rendered preview, in DPI.
const PREVIEW_DPI: &str = "150";
const OUTPUT_STEM: &str = "preview";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Only PDF files can be previewed: {0}")]
    NotPdf(String),

    #[error("Renderer I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// A rendered page image ready to upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub bytes: Bytes,
}

#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Renders the first page of the document `name` to a PNG.
    async fn render_first_page(&self, name: &str, bytes: &[u8]) -> Result<ImageFile, RenderError>;
}

pub fn is_pdf(name: &str, bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF") || name.to_ascii_lowercase().ends_with(".pdf")
}

/// `resume.pdf` → `resume.png`.
pub fn image_name_for(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("resume");
    format!("{stem}.png")
}

pub struct PdftoppmRenderer {
    binary: String,
}

impl PdftoppmRenderer {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl PreviewRenderer for PdftoppmRenderer {
    async fn render_first_page(&self, name: &str, bytes: &[u8]) -> Result<ImageFile, RenderError> {
        if !is_pdf(name, bytes) {
            return Err(RenderError::NotPdf(name.to_string()));
        }

        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.pdf");
        tokio::fs::write(&input, bytes).await?;
        let output_stem = dir.path().join(OUTPUT_STEM);

        debug!(binary = %self.binary, name, "Rendering first page");
        let output = Command::new(&self.binary)
            .args(["-png", "-singlefile", "-r", PREVIEW_DPI, "-f", "1", "-l", "1"])
            .arg(&input)
            .arg(&output_stem)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RenderError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let png = tokio::fs::read(output_stem.with_extension("png")).await?;
        Ok(ImageFile {
            name: image_name_for(name),
            bytes: Bytes::from(png),
        })
    }
}
