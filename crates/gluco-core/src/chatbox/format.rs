//! Renders a [`Reading`] into chatbox text.
//!
//! ```text
//! BG 120 →
//! BG LOW ↓↓
//! ```

use crate::domain::reading::Reading;

/// Maximum number of characters the chatbox accepts in one message.
pub const CHATBOX_MAX_CHARS: usize = 144;

/// Text template settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatboxFormat {
    /// Label placed before the value, e.g. `"BG"`.  May be empty.
    pub prefix: String,
}

impl Default for ChatboxFormat {
    fn default() -> Self {
        Self {
            prefix: "BG".to_string(),
        }
    }
}

/// Renders `reading` as `"{prefix} {value} {arrow}"`.
///
/// Empty parts are dropped so no double or trailing spaces appear, and the
/// result is cut to [`CHATBOX_MAX_CHARS`] characters.
pub fn format_reading(reading: &Reading, format: &ChatboxFormat) -> String {
    let value = reading.value.to_string();
    let parts = [format.prefix.trim(), value.as_str(), reading.trend.arrow()];
    let text = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&text, CHATBOX_MAX_CHARS)
}

/// Cuts `text` to at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
