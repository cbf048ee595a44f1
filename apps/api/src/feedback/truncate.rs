//! Bounds résumé text before it is embedded in a prompt.
//!
//! Lengths are counted in characters, never bytes, so a cut can't land inside
//! a multi-byte sequence.

use std::borrow::Cow;

pub const DEFAULT_MAX_PROMPT_CHARS: usize = 50_000;
pub const ELLIPSIS: &str = "...";

/// A boundary is only used when it lies past this fraction of the window.
const BOUNDARY_THRESHOLD: f64 = 0.8;

/// Truncates `text` to at most `max_chars` characters.
///
/// Text within the limit is returned unchanged. Otherwise the first
/// `max_chars` characters are kept and the last `.`, newline or space in them
/// is located: past 80% of the window the text is cut there (boundary
/// included), else the full window is kept and `...` appended.
pub fn truncate_text(text: &str, max_chars: usize) -> Cow<'_, str> {
    let window_end = match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => byte_idx,
        None => return Cow::Borrowed(text),
    };
    let window = &text[..window_end];

    let mut last_boundary: Option<(usize, usize)> = None;
    for (char_idx, (byte_idx, c)) in window.char_indices().enumerate() {
        if matches!(c, '.' | '\n' | ' ') {
            last_boundary = Some((char_idx, byte_idx + c.len_utf8()));
        }
    }

    match last_boundary {
        Some((char_idx, end)) if char_idx as f64 > max_chars as f64 * BOUNDARY_THRESHOLD => {
            Cow::Borrowed(&window[..end])
        }
        _ => Cow::Owned(format!("{window}{ELLIPSIS}")),
    }
}
