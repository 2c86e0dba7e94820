// Prompt constants for resume evaluation.

/// Evaluation prompt template.
/// Replace: {company_name}, {job_title}, {job_description}
pub const FEEDBACK_PROMPT_TEMPLATE: &str = r#"You are an expert in ATS (Applicant Tracking System) and resume analysis.
Analyze and rate the attached resume and suggest how to improve it.
The rating can be low if the resume is bad. Be thorough and detailed.
Do not be afraid to point out mistakes or areas for improvement.
If provided, take the job description into consideration.

Company name: {company_name}
Job title: {job_title}
Job description: {job_description}

Return a JSON object with this EXACT schema (no extra fields):
{
  "overallScore": 0,
  "ATS": {
    "score": 0,
    "tips": [{"type": "good", "tip": "short title"}]
  },
  "toneAndStyle": {
    "score": 0,
    "tips": [{"type": "improve", "tip": "short title", "explanation": "detailed explanation"}]
  },
  "content": {
    "score": 0,
    "tips": [{"type": "good", "tip": "short title", "explanation": "detailed explanation"}]
  },
  "structure": {
    "score": 0,
    "tips": [{"type": "improve", "tip": "short title", "explanation": "detailed explanation"}]
  },
  "skills": {
    "score": 0,
    "tips": [{"type": "good", "tip": "short title", "explanation": "detailed explanation"}]
  }
}

Rules:
- Every score is an integer from 0 to 100.
- "type" is either "good" or "improve".
- Give 3-4 tips per category.
- Respond with the JSON object only. Do NOT use markdown code fences or add commentary."#;

const NOT_PROVIDED: &str = "Not provided";

/// Fills the evaluation template. Missing fields read as "Not provided".
pub fn build_feedback_prompt(
    company_name: Option<&str>,
    job_title: Option<&str>,
    job_description: Option<&str>,
) -> String {
    FEEDBACK_PROMPT_TEMPLATE
        .replace("{company_name}", company_name.unwrap_or(NOT_PROVIDED))
        .replace("{job_title}", job_title.unwrap_or(NOT_PROVIDED))
        .replace("{job_description}", job_description.unwrap_or(NOT_PROVIDED))
}
