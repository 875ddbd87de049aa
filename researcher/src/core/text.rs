//! Small string helpers shared by logging, prompts, and reports.

/// Longest prefix of `text` that fits in `max_bytes` without splitting a character.
pub fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Short form of `text` for log lines, with an ellipsis when cut.
pub fn preview(text: &str, max_bytes: usize) -> String {
    let cut = truncate_on_char_boundary(text, max_bytes);
    if cut.len() < text.len() {
        format!("{cut}...")
    } else {
        cut.to_string()
    }
}

/// File-name-safe form of a subject name.
///
/// Keeps alphanumerics, `_` and `-`; whitespace runs become a single `_`;
/// everything else is dropped. Never returns an empty string.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_gap = false;
    for ch in name.chars() {
        if ch.is_whitespace() {
            pending_gap = true;
        } else if ch.is_alphanumeric() || ch == '_' || ch == '-' {
            if pending_gap && !out.is_empty() {
                out.push('_');
            }
            pending_gap = false;
            out.push(ch);
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}
