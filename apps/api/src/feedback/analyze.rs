//! The upload-and-analyze flow for one résumé.
//!
//! Steps run strictly in order and the first failure short-circuits the rest.
//! Each step reports an `AnalysisStatus` to the caller before it starts.

use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::ai::service::AiService;
use crate::ai::AiError;
use crate::feedback::extract::extract_text;
use crate::feedback::parse::{parse_feedback, FeedbackParseError};
use crate::feedback::prompt::build_feedback_prompt;
use crate::feedback::records::save_record;
use crate::models::resume::ResumeRecord;
use crate::render::{PreviewRenderer, RenderError};
use crate::storage::{FileStore, KvStore, StorageError, UploadFile};

/// What the user submitted on the upload form.
#[derive(Debug, Clone)]
pub struct ResumeSubmission {
    pub company_name: String,
    pub job_title: String,
    pub job_description: String,
    pub file: UploadFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    UploadingFile,
    ConvertingToImage,
    UploadingImage,
    PreparingData,
    Analyzing,
    Completed,
}

impl AnalysisStatus {
    pub fn message(self) -> &'static str {
        match self {
            AnalysisStatus::UploadingFile => "Uploading the file...",
            AnalysisStatus::ConvertingToImage => "Converting to image...",
            AnalysisStatus::UploadingImage => "Uploading the image...",
            AnalysisStatus::PreparingData => "Preparing data...",
            AnalysisStatus::Analyzing => "Analyzing...",
            AnalysisStatus::Completed => "Analysis complete, redirecting...",
        }
    }
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to upload file: {0}")]
    UploadFailed(#[source] StorageError),

    #[error("Failed to convert PDF to image: {0}")]
    ConvertFailed(#[source] RenderError),

    #[error("Failed to upload image: {0}")]
    ImageUploadFailed(#[source] StorageError),

    #[error("Failed to save resume record: {0}")]
    PersistFailed(#[source] StorageError),

    #[error("Failed to read uploaded file: {0}")]
    ReadFailed(#[source] StorageError),

    #[error("Failed to analyze resume: {0}")]
    AnalysisFailed(#[source] AiError),

    #[error("Failed to parse feedback: {0}")]
    FeedbackParse(#[from] FeedbackParseError),
}

impl AnalysisError {
    /// The user-visible status line for this failure.
    pub fn status_message(&self) -> &'static str {
        match self {
            AnalysisError::UploadFailed(_) => "Error: Failed to upload file",
            AnalysisError::ConvertFailed(_) => "Error: Failed to convert PDF to image",
            AnalysisError::ImageUploadFailed(_) => "Error: Failed to upload image",
            AnalysisError::PersistFailed(_) => "Error: Failed to save resume data",
            AnalysisError::ReadFailed(_) => "Error: Failed to read uploaded file",
            AnalysisError::AnalysisFailed(_) => "Error: Failed to analyze resume",
            AnalysisError::FeedbackParse(_) => "Error: Failed to parse resume feedback",
        }
    }
}

/// Collaborators the flow runs against.
pub struct AnalysisDeps<'a> {
    pub kv: &'a dyn KvStore,
    pub files: &'a dyn FileStore,
    pub renderer: &'a dyn PreviewRenderer,
    pub ai: &'a AiService,
    pub max_prompt_chars: usize,
}

/// Uploads the résumé and its preview, persists a record, asks the active AI
/// backend for feedback and stores the parsed result on the record.
pub async fn analyze_resume(
    deps: &AnalysisDeps<'_>,
    submission: ResumeSubmission,
    mut on_status: impl FnMut(AnalysisStatus),
) -> Result<ResumeRecord, AnalysisError> {
    let ResumeSubmission {
        company_name,
        job_title,
        job_description,
        file,
    } = submission;
    let file_name = file.name.clone();

    on_status(AnalysisStatus::UploadingFile);
    let source_bytes = file.bytes.clone();
    let uploaded = deps
        .files
        .upload(file)
        .await
        .map_err(AnalysisError::UploadFailed)?;
    info!(path = %uploaded.path, size = uploaded.size, "Resume uploaded");

    on_status(AnalysisStatus::ConvertingToImage);
    let image = deps
        .renderer
        .render_first_page(&file_name, &source_bytes)
        .await
        .map_err(AnalysisError::ConvertFailed)?;

    on_status(AnalysisStatus::UploadingImage);
    let uploaded_image = deps
        .files
        .upload(UploadFile {
            name: image.name,
            bytes: image.bytes,
            content_type: Some("image/png".to_string()),
        })
        .await
        .map_err(AnalysisError::ImageUploadFailed)?;

    on_status(AnalysisStatus::PreparingData);
    let mut record = ResumeRecord {
        id: Uuid::new_v4(),
        resume_path: uploaded.path.clone(),
        image_path: uploaded_image.path,
        company_name,
        job_title,
        job_description,
        feedback: None,
        created_at: Some(Utc::now()),
    };
    save_record(deps.kv, &record)
        .await
        .map_err(AnalysisError::PersistFailed)?;
    info!(id = %record.id, "Resume record created");

    on_status(AnalysisStatus::Analyzing);
    let stored = deps
        .files
        .read(&uploaded.path)
        .await
        .map_err(AnalysisError::ReadFailed)?;
    let resume_text = extract_text(&file_name, stored).await;
    let prompt = build_feedback_prompt(
        &record.job_title,
        &record.job_description,
        &resume_text,
        deps.max_prompt_chars,
    );

    let response = deps
        .ai
        .feedback(&uploaded.path, &prompt)
        .await
        .map_err(AnalysisError::AnalysisFailed)?;
    let feedback = parse_feedback(response.text().unwrap_or_default())?;

    record.feedback = Some(feedback);
    save_record(deps.kv, &record)
        .await
        .map_err(AnalysisError::PersistFailed)?;
    info!(id = %record.id, "Resume analysis stored");

    on_status(AnalysisStatus::Completed);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::service::testing::{service_with, FakeBackend};
    use crate::ai::ServiceKind;
    use crate::feedback::parse::fixtures::VALID_FEEDBACK;
    use crate::feedback::records::load_record;
    use crate::render::testing::FakeRenderer;
    use crate::storage::memory::{MemoryFiles, MemoryKv};
    use bytes::Bytes;

    struct Harness {
        kv: MemoryKv,
        files: MemoryFiles,
        renderer: FakeRenderer,
        backend: std::sync::Arc<FakeBackend>,
        ai: AiService,
    }

    impl Harness {
        fn new(backend: std::sync::Arc<FakeBackend>) -> Self {
            Self {
                kv: MemoryKv::default(),
                files: MemoryFiles::default(),
                renderer: FakeRenderer { fail: false },
                ai: service_with(ServiceKind::Hosted, backend.clone()),
                backend,
            }
        }

        fn replying(reply: &str) -> Self {
            Self::new(FakeBackend::replying(ServiceKind::Hosted, reply))
        }

        fn deps(&self) -> AnalysisDeps<'_> {
            AnalysisDeps {
                kv: &self.kv,
                files: &self.files,
                renderer: &self.renderer,
                ai: &self.ai,
                max_prompt_chars: 50_000,
            }
        }

        async fn run(&self) -> (Result<ResumeRecord, AnalysisError>, Vec<AnalysisStatus>) {
            let mut statuses = Vec::new();
            let result = analyze_resume(&self.deps(), submission(), |s| statuses.push(s)).await;
            (result, statuses)
        }
    }

    fn submission() -> ResumeSubmission {
        ResumeSubmission {
            company_name: "Acme".to_string(),
            job_title: "Backend Engineer".to_string(),
            job_description: "Rust services".to_string(),
            file: UploadFile {
                name: "cv.txt".to_string(),
                bytes: Bytes::from_static(b"Jane Doe. Senior engineer."),
                content_type: Some("text/plain".to_string()),
            },
        }
    }

    #[tokio::test]
    async fn test_successful_analysis_persists_feedback() {
        let h = Harness::replying(VALID_FEEDBACK);
        let (result, statuses) = h.run().await;
        let record = result.unwrap();

        assert_eq!(
            statuses,
            vec![
                AnalysisStatus::UploadingFile,
                AnalysisStatus::ConvertingToImage,
                AnalysisStatus::UploadingImage,
                AnalysisStatus::PreparingData,
                AnalysisStatus::Analyzing,
                AnalysisStatus::Completed,
            ]
        );
        assert_eq!(record.resume_path, "uploads/0/cv.txt");
        assert_eq!(record.image_path, "uploads/1/cv.png");
        assert_eq!(record.feedback.as_ref().unwrap().overall_score, 72.0);

        let stored = load_record(&h.kv, record.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_backend_receives_path_and_embedded_text() {
        let h = Harness::replying(VALID_FEEDBACK);
        h.run().await.0.unwrap();

        let calls = h.backend.calls.lock().clone();
        assert_eq!(calls.len(), 1);
        let expected_len = build_feedback_prompt(
            "Backend Engineer",
            "Rust services",
            "Jane Doe. Senior engineer.",
            50_000,
        )
        .len();
        assert_eq!(calls[0], format!("feedback:uploads/0/cv.txt:{expected_len}"));
    }

    #[tokio::test]
    async fn test_upload_failure_stops_before_anything_else() {
        let h = Harness::replying(VALID_FEEDBACK);
        h.files.fail_uploads_after(0);
        let (result, statuses) = h.run().await;

        let err = result.unwrap_err();
        assert!(matches!(err, AnalysisError::UploadFailed(_)));
        assert_eq!(err.status_message(), "Error: Failed to upload file");
        assert_eq!(statuses, vec![AnalysisStatus::UploadingFile]);
        assert!(h.kv.snapshot().is_empty());
        assert!(h.backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_convert_failure() {
        let mut h = Harness::replying(VALID_FEEDBACK);
        h.renderer = FakeRenderer { fail: true };
        let (result, statuses) = h.run().await;

        assert!(matches!(result, Err(AnalysisError::ConvertFailed(_))));
        assert_eq!(statuses.last(), Some(&AnalysisStatus::ConvertingToImage));
        assert_eq!(h.files.paths(), vec!["uploads/0/cv.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_image_upload_failure() {
        let h = Harness::replying(VALID_FEEDBACK);
        h.files.fail_uploads_after(1);
        let (result, _) = h.run().await;

        assert!(matches!(result, Err(AnalysisError::ImageUploadFailed(_))));
        assert!(h.kv.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_initial_persist_failure() {
        let h = Harness::replying(VALID_FEEDBACK);
        h.kv.fail_writes();
        let (result, statuses) = h.run().await;

        assert!(matches!(result, Err(AnalysisError::PersistFailed(_))));
        assert_eq!(statuses.last(), Some(&AnalysisStatus::PreparingData));
        assert!(h.backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_after_upload() {
        let h = Harness::replying(VALID_FEEDBACK);
        h.files.make_unreadable("uploads/0/cv.txt");
        let (result, statuses) = h.run().await;

        assert!(matches!(result, Err(AnalysisError::ReadFailed(_))));
        assert_eq!(statuses.last(), Some(&AnalysisStatus::Analyzing));
        assert!(h.backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_record_without_feedback() {
        let h = Harness::new(FakeBackend::failing(ServiceKind::Hosted));
        let (result, _) = h.run().await;

        let err = result.unwrap_err();
        assert!(matches!(err, AnalysisError::AnalysisFailed(_)));
        assert_eq!(err.status_message(), "Error: Failed to analyze resume");

        let stored = h.kv.snapshot();
        assert_eq!(stored.len(), 1);
        let record: ResumeRecord =
            serde_json::from_str(stored.values().next().unwrap()).unwrap();
        assert!(record.feedback.is_none());
    }

    #[tokio::test]
    async fn test_unparseable_feedback_is_hard_failure() {
        let h = Harness::replying("I think this resume is pretty good!");
        let (result, statuses) = h.run().await;

        assert!(matches!(result, Err(AnalysisError::FeedbackParse(_))));
        assert!(!statuses.contains(&AnalysisStatus::Completed));
    }

    #[tokio::test]
    async fn test_final_persist_failure() {
        let h = Harness::replying(VALID_FEEDBACK);
        h.kv.fail_writes_after(1);
        let (result, _) = h.run().await;

        assert!(matches!(result, Err(AnalysisError::PersistFailed(_))));
    }

    #[tokio::test]
    async fn test_unavailable_backend() {
        let h = Harness::replying(VALID_FEEDBACK);
        h.ai.set_service_type(ServiceKind::Bridge);
        let (result, _) = h.run().await;

        assert!(matches!(
            result,
            Err(AnalysisError::AnalysisFailed(AiError::Unavailable(ServiceKind::Bridge)))
        ));
    }
}
