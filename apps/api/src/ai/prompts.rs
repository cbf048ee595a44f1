// Prompt fragments shared by the AI backends.
// Feedback prompts live alongside the feedback pipeline in feedback/prompts.rs.

/// Instruction sent with every image for text extraction.
pub const IMG2TXT_INSTRUCTION: &str = "Extract all text content from this image.";

/// Placeholder used when a file part is sent to a backend that cannot read storage paths.
pub fn file_placeholder(path: &str) -> String {
    format!("[File: {path}]")
}
