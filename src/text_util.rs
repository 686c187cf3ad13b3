/// Number of characters shown when previewing loaded content.
pub const DEFAULT_PREVIEW_CHARS: usize = 1_000;

/// Return the first `max_chars` characters of `text`.
///
/// Counts Unicode scalar values, so the cut always lands on a char
/// boundary. The flag is `true` when anything was cut off.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}

/// The first `max_chars` characters of `text`, with `...` appended when the
/// text is longer.
pub fn preview(text: &str, max_chars: usize) -> String {
    let (head, truncated) = truncate_chars(text, max_chars);
    if truncated {
        format!("{head}...")
    } else {
        head.to_string()
    }
}

/// Character count, as opposed to `str::len` which counts bytes.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}
