//! Résumé feedback: prompt assembly, the upload-and-analyze flow, and the
//! records it persists.

pub mod analyze;
pub mod extract;
pub mod handlers;
pub mod parse;
pub mod prompt;
pub mod prompts;
pub mod records;
pub mod truncate;
