use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::llm_client::strip_json_fences;
use crate::platform::BlobRef;

/// Metadata records live under `resume:<id>`.
pub const RECORD_PREFIX: &str = "resume:";
pub const RECORD_PATTERN: &str = "resume:*";
/// Write-ahead intents for in-flight uploads live under `intent:<id>`.
pub const INTENT_PREFIX: &str = "intent:";
pub const INTENT_PATTERN: &str = "intent:*";

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

pub fn record_key(id: &str) -> String {
    format!("{RECORD_PREFIX}{id}")
}

pub fn intent_key(id: &str) -> String {
    format!("{INTENT_PREFIX}{id}")
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("overallScore is not a finite number")]
    NonFiniteScore,
}

/// AI feedback for one resume. Only `overallScore` is interpreted; the
/// per-category sections (`ATS`, `toneAndStyle`, ...) are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResult {
    pub overall_score: f64,
    #[serde(flatten)]
    pub categories: Map<String, Value>,
}

impl FeedbackResult {
    /// Parses a model reply, tolerating code fences. The score is clamped
    /// into `MIN_SCORE..=MAX_SCORE`.
    pub fn parse(text: &str) -> Result<Self, FeedbackError> {
        let mut feedback: FeedbackResult = serde_json::from_str(strip_json_fences(text))?;
        if !feedback.overall_score.is_finite() {
            return Err(FeedbackError::NonFiniteScore);
        }
        feedback.overall_score = feedback.overall_score.clamp(MIN_SCORE, MAX_SCORE);
        Ok(feedback)
    }
}

/// User-supplied details about the application a resume targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMetadata {
    pub company_name: Option<String>,
    pub job_title: Option<String>,
    /// Only used to build the evaluation prompt; not persisted.
    pub job_description: Option<String>,
}

impl ResumeMetadata {
    /// Trims every field and drops the empty ones.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            company_name: clean(self.company_name),
            job_title: clean(self.job_title),
            job_description: clean(self.job_description),
        }
    }
}

/// The stored resume entity. Serialized as camelCase JSON under `resume:<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    pub image_path: BlobRef,
    pub resume_path: BlobRef,
    pub feedback: FeedbackResult,
}

impl ResumeRecord {
    pub fn key(&self) -> String {
        record_key(&self.id)
    }
}

/// Written before the first blob of an upload and removed after its record
/// lands, so an interrupted upload can be found and cleaned up later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntent {
    pub id: String,
    /// Process run that wrote the intent. Empty when written by a build that
    /// did not stamp intents.
    #[serde(default)]
    pub run_id: String,
    pub resume_path: BlobRef,
    pub image_path: BlobRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feedback_with_fences() {
        let text = "```json\n{\"overallScore\": 85, \"ATS\": {\"score\": 90, \"tips\": []}}\n```";
        let feedback = FeedbackResult::parse(text).unwrap();
        assert_eq!(feedback.overall_score, 85.0);
        assert_eq!(feedback.categories["ATS"]["score"], 90);
    }

    #[test]
    fn test_parse_feedback_clamps_score() {
        let feedback = FeedbackResult::parse(r#"{"overallScore": 140}"#).unwrap();
        assert_eq!(feedback.overall_score, MAX_SCORE);
        let feedback = FeedbackResult::parse(r#"{"overallScore": -3}"#).unwrap();
        assert_eq!(feedback.overall_score, MIN_SCORE);
    }

    #[test]
    fn test_parse_feedback_requires_score() {
        assert!(matches!(
            FeedbackResult::parse(r#"{"ATS": {}}"#),
            Err(FeedbackError::Parse(_))
        ));
    }

    #[test]
    fn test_record_wire_format_is_camel_case() {
        let record = ResumeRecord {
            id: "abc".to_string(),
            company_name: Some("Acme".to_string()),
            job_title: None,
            image_path: BlobRef::new("/abc-preview.svg"),
            resume_path: BlobRef::new("/abc-resume.pdf"),
            feedback: FeedbackResult::parse(r#"{"overallScore": 70}"#).unwrap(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["companyName"], "Acme");
        assert!(json.get("jobTitle").is_none());
        assert_eq!(json["imagePath"], "/abc-preview.svg");
        assert_eq!(json["feedback"]["overallScore"], 70.0);
        assert_eq!(record.key(), "resume:abc");
    }

    #[test]
    fn test_record_reads_legacy_entries() {
        // Entries written by the browser client carry empty strings and integer scores.
        let raw = r#"{"id":"x1","companyName":"","jobTitle":"Engineer","imagePath":"/x1.png","resumePath":"/x1.pdf","feedback":{"overallScore":64,"skills":{"score":60,"tips":[]}}}"#;
        let record: ResumeRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.company_name.as_deref(), Some(""));
        assert_eq!(record.feedback.overall_score, 64.0);
        assert!(record.feedback.categories.contains_key("skills"));
    }

    #[test]
    fn test_metadata_normalization() {
        let meta = ResumeMetadata {
            company_name: Some("  Acme ".to_string()),
            job_title: Some("   ".to_string()),
            job_description: None,
        }
        .normalized();
        assert_eq!(meta.company_name.as_deref(), Some("Acme"));
        assert_eq!(meta.job_title, None);
    }
}
