use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Longest file stem written by the exporter, before the extension.
pub const MAX_STEM_CHARS: usize = 250;

static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.\w\s-]").unwrap());
static SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-_\s]+").unwrap());
static DOTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.+").unwrap());

/// Turn an arbitrary display string into a file name.
///
/// Accents are decomposed and dropped, anything other than ASCII word
/// characters, whitespace, `-` and `.` is removed, separator runs become a
/// single `-`, dot runs a single `.`, and leading/trailing `-_.` are trimmed.
pub fn sanitize_filename(input: &str) -> String {
    let ascii: String = input.nfkd().filter(char::is_ascii).collect();
    let cleaned = DISALLOWED.replace_all(&ascii, "");
    let cleaned = SEPARATORS.replace_all(&cleaned, "-");
    let cleaned = DOTS.replace_all(&cleaned, ".");
    cleaned.trim_matches(['-', '_', '.']).to_string()
}

/// Sanitized, truncated stem plus extension; `fallback` when nothing survives.
pub fn output_file_name(display: &str, fallback: &str, extension: &str) -> String {
    let mut stem = sanitize_filename(display);
    if stem.is_empty() {
        stem = sanitize_filename(fallback);
    }
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    format!("{}.{extension}", stem.trim_end_matches(['-', '_', '.']))
}

/// Escape the XML metacharacters `&`, `<` and `>`.
pub fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
