use thiserror::Error;

use crate::ai::strip_json_fences;
use crate::models::resume::Feedback;

#[derive(Debug, Error)]
pub enum FeedbackParseError {
    #[error("AI response contained no text")]
    Empty,

    #[error("AI response is not valid feedback JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Score for {field} out of range: {score}")]
    OutOfRange { field: &'static str, score: f64 },
}

/// Parses model output into `Feedback`. Code fences are stripped and every
/// score must lie in 0–100; anything else is an error, never a default.
pub fn parse_feedback(text: &str) -> Result<Feedback, FeedbackParseError> {
    let json = strip_json_fences(text);
    if json.is_empty() {
        return Err(FeedbackParseError::Empty);
    }

    let feedback: Feedback = serde_json::from_str(json)?;
    if let Some((field, score)) = feedback
        .scores()
        .into_iter()
        .find(|(_, s)| !(0.0..=100.0).contains(s))
    {
        return Err(FeedbackParseError::OutOfRange { field, score });
    }
    Ok(feedback)
}
