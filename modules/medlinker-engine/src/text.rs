//! Keyword search and evidence windows over raw source text.

use regex::Regex;

use medlinker_common::MAX_SNIPPET_CHARS;

/// First case-insensitive occurrence of `keyword` in `text`, as a byte
/// range.
pub(crate) fn find_keyword(text: &str, keyword: &str) -> Option<(usize, usize)> {
    let pattern = format!("(?i){}", regex::escape(keyword));
    let re = Regex::new(&pattern).ok()?;
    re.find(text).map(|m| (m.start(), m.end()))
}

/// Like `find_keyword` but anchored at word boundaries, for short
/// keywords that would otherwise match inside unrelated words.
pub(crate) fn find_keyword_word(text: &str, keyword: &str) -> Option<(usize, usize)> {
    let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
    let re = Regex::new(&pattern).ok()?;
    re.find(text).map(|m| (m.start(), m.end()))
}

/// Context window of ±`window` bytes around a match, clamped to char
/// boundaries, trimmed, and cut to the snippet limit.
///
/// The cut never appends an ellipsis: a snippet must remain an exact
/// substring of `text` to satisfy the grounding invariant.
pub(crate) fn window_snippet(text: &str, start: usize, end: usize, window: usize) -> String {
    let mut lo = start.saturating_sub(window);
    let mut hi = usize::min(text.len(), end.saturating_add(window));
    while lo > 0 && !text.is_char_boundary(lo) {
        lo -= 1;
    }
    while hi < text.len() && !text.is_char_boundary(hi) {
        hi += 1;
    }
    let snippet = text[lo..hi].trim();
    if snippet.chars().count() > MAX_SNIPPET_CHARS {
        snippet
            .chars()
            .take(MAX_SNIPPET_CHARS)
            .collect::<String>()
            .trim_end()
            .to_string()
    } else {
        snippet.to_string()
    }
}
