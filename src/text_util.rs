/// Maximum number of characters of a unit shown in error messages.
pub const DEFAULT_PREVIEW_CHARS: usize = 80;

/// Shorten `text` to at most `max_chars` characters, marking the cut.
///
/// Truncation happens on a character boundary, never inside a multi-byte
/// character.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars).collect();
    short.push_str("...");
    short
}
