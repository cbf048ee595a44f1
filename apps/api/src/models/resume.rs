use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Key-value prefix shared by every stored résumé record.
pub const RESUME_KEY_PATTERN: &str = "resume:*";

pub fn resume_key(id: Uuid) -> String {
    format!("resume:{id}")
}

/// The persisted unit of work for one uploaded résumé.
///
/// Created with empty feedback right after upload, then updated in place once
/// the AI feedback has been parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: Uuid,
    pub resume_path: String,
    pub image_path: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub job_description: String,
    /// `None` until analysis completes. Stored as `null`; an empty string is
    /// also read as "no feedback yet".
    #[serde(default, deserialize_with = "deserialize_optional_feedback")]
    pub feedback: Option<Feedback>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn deserialize_optional_feedback<'de, D>(deserializer: D) -> Result<Option<Feedback>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) if s.is_empty() => Ok(None),
        other => serde_json::from_value(other)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// One scored dimension of the feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackCategory {
    /// 0 – 100, fractional values allowed.
    pub score: f64,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

/// Structured scoring parsed from the AI response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub overall_score: f64, // 0 – 100
    #[serde(rename = "ATS", default, skip_serializing_if = "Option::is_none")]
    pub ats: Option<FeedbackCategory>,
    pub tone_and_style: FeedbackCategory,
    pub content: FeedbackCategory,
    pub structure: FeedbackCategory,
    pub skills: FeedbackCategory,
}

impl Feedback {
    /// Every score paired with the field it came from, in schema order.
    pub fn scores(&self) -> Vec<(&'static str, f64)> {
        let mut scores = vec![("overallScore", self.overall_score)];
        if let Some(ats) = &self.ats {
            scores.push(("ATS", ats.score));
        }
        scores.extend([
            ("toneAndStyle", self.tone_and_style.score),
            ("content", self.content.score),
            ("structure", self.structure.score),
            ("skills", self.skills.score),
        ]);
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record_json(feedback: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "7f1c0a8e-8d2b-4c4e-9b55-3f0d3c7c2a11",
            "resumePath": "uploads/1/resume.pdf",
            "imagePath": "uploads/2/resume.png",
            "companyName": "Acme",
            "jobTitle": "Engineer",
            "jobDescription": "Build things",
            "feedback": feedback
        })
    }

    #[test]
    fn test_empty_string_feedback_reads_as_none() {
        let record: ResumeRecord = serde_json::from_value(record_json(json!(""))).unwrap();
        assert!(record.feedback.is_none());
        assert!(record.created_at.is_none());
    }

    #[test]
    fn test_null_feedback_reads_as_none() {
        let record: ResumeRecord = serde_json::from_value(record_json(json!(null))).unwrap();
        assert!(record.feedback.is_none());
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record: ResumeRecord = serde_json::from_value(record_json(json!(null))).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["resumePath"], "uploads/1/resume.pdf");
        assert_eq!(value["jobTitle"], "Engineer");
        assert!(value["feedback"].is_null());
    }

    #[test]
    fn test_feedback_with_ats_and_tips() {
        let feedback = json!({
            "overallScore": 78,
            "ATS": {"score": 70, "tips": [{"type": "improve", "tip": "Add keywords"}]},
            "toneAndStyle": {"score": 80, "tips": [{"type": "good", "tip": "Clear", "explanation": "Concise bullets"}]},
            "content": {"score": 75, "tips": []},
            "structure": {"score": 85},
            "skills": {"score": 60, "tips": []}
        });
        let record: ResumeRecord = serde_json::from_value(record_json(feedback)).unwrap();
        let feedback = record.feedback.unwrap();

        assert_eq!(feedback.overall_score, 78.0);
        assert_eq!(feedback.ats.as_ref().unwrap().tips[0].kind, TipKind::Improve);
        assert_eq!(
            feedback.tone_and_style.tips[0].explanation.as_deref(),
            Some("Concise bullets")
        );
        assert!(feedback.structure.tips.is_empty());
        assert_eq!(
            feedback.scores(),
            vec![
                ("overallScore", 78.0),
                ("ATS", 70.0),
                ("toneAndStyle", 80.0),
                ("content", 75.0),
                ("structure", 85.0),
                ("skills", 60.0),
            ]
        );
    }

    #[test]
    fn test_resume_key_format() {
        let id = Uuid::nil();
        assert_eq!(
            resume_key(id),
            "resume:00000000-0000-0000-0000-000000000000"
        );
        assert!(resume_key(id).starts_with(RESUME_KEY_PATTERN.trim_end_matches('*')));
    }
}
