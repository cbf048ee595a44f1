use bytes::Bytes;
use tracing::warn;

use crate::render::is_pdf;

/// Pulls plain text out of an uploaded résumé.
///
/// PDFs go through `pdf-extract` on the blocking pool; everything else is read
/// as UTF-8. A PDF that fails to parse (or panics the parser) falls back to a
/// lossy decode of the raw bytes.
pub async fn extract_text(name: &str, bytes: Bytes) -> String {
    if is_pdf(name, &bytes) {
        let pdf = bytes.clone();
        match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&pdf)).await {
            Ok(Ok(text)) => return text,
            Ok(Err(e)) => warn!(name, error = %e, "PDF text extraction failed, decoding raw bytes"),
            Err(e) => warn!(name, error = %e, "PDF text extraction aborted, decoding raw bytes"),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}
