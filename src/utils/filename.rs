//! Safe filename generation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of a sanitized title, in characters
pub const MAX_TITLE_CHARS: usize = 100;

/// Characters removed outright before any other rewriting
pub const HOSTILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

fn disallowed() -> &'static Regex {
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();
    DISALLOWED.get_or_init(|| Regex::new(r"[^\w\s\[\]\(\)-]").expect("static regex is valid"))
}

/// Turn an arbitrary title into a filesystem-safe file stem.
///
/// Hostile characters are dropped, anything else outside word characters,
/// whitespace, brackets, parentheses and `-` becomes `_`. Word characters
/// follow Unicode: letters, digits, combining marks, connector punctuation
/// and joiners all survive. The result is cut
/// to [`MAX_TITLE_CHARS`] characters and trimmed. Distinct titles may map to
/// the same stem.
pub fn sanitize_title(title: &str) -> String {
    let stripped: String = title.chars().filter(|c| !HOSTILE_CHARS.contains(c)).collect();
    let replaced = disallowed().replace_all(&stripped, "_");
    let truncated: String = replaced.chars().take(MAX_TITLE_CHARS).collect();
    truncated.trim().to_string()
}

/// File name for a video: sanitized title plus extension.
///
/// Falls back to the video ID when the title sanitizes to nothing.
pub fn output_file_stem(title: &str, video_id: &str) -> String {
    let stem = sanitize_title(title);
    if stem.is_empty() {
        sanitize_title(video_id)
    } else {
        stem
    }
}
