//! Prompt assembly: instructions for the target job plus the bounded résumé text.

use crate::feedback::prompts::{
    FEEDBACK_PROMPT_TEMPLATE, FEEDBACK_RESPONSE_FORMAT, RESUME_SECTION_HEADER,
};
use crate::feedback::truncate::truncate_text;

/// Renders the feedback instructions for one job.
pub fn prepare_instructions(job_title: &str, job_description: &str) -> String {
    FEEDBACK_PROMPT_TEMPLATE
        .replace("{response_format}", FEEDBACK_RESPONSE_FORMAT)
        .replace("{job_title}", job_title)
        .replace("{job_description}", job_description)
}

/// Builds the complete prompt handed to `feedback`: instructions, a labelled
/// section header, then the résumé text truncated to `max_chars`.
pub fn build_feedback_prompt(
    job_title: &str,
    job_description: &str,
    resume_text: &str,
    max_chars: usize,
) -> String {
    format!(
        "{}\n\n{}\n{}",
        prepare_instructions(job_title, job_description),
        RESUME_SECTION_HEADER,
        truncate_text(resume_text, max_chars)
    )
}
