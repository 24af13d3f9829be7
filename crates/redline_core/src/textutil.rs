//! Offset helpers shared by the locator, splitter and prioritizer.
//!
//! Offsets are byte offsets into UTF-8 text, always on char boundaries.
//! Window sizes are counted in chars. Case-insensitive matching folds ASCII
//! only, which keeps byte offsets identical between the folded and the
//! original text.

/// Byte offset `n` chars before `pos`, clamped to the start of `text`.
pub fn back_chars(text: &str, pos: usize, n: usize) -> usize {
    if n == 0 {
        return pos;
    }
    text[..pos]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

/// Byte offset `n` chars after `pos`, clamped to the end of `text`.
pub fn forward_chars(text: &str, pos: usize, n: usize) -> usize {
    text[pos..]
        .char_indices()
        .nth(n)
        .map(|(idx, _)| pos + idx)
        .unwrap_or(text.len())
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First case-insensitive occurrence of `needle` in `haystack`.
pub fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .to_ascii_lowercase()
        .find(&needle.to_ascii_lowercase())
}

/// All non-overlapping case-insensitive occurrences, scanning left to right.
pub fn find_all_ignore_case(haystack: &str, needle: &str) -> Vec<usize> {
    if needle.is_empty() {
        return Vec::new();
    }
    let hay = haystack.to_ascii_lowercase();
    let needle = needle.to_ascii_lowercase();
    hay.match_indices(&needle).map(|(idx, _)| idx).collect()
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    find_ignore_case(haystack, needle).is_some()
}

/// Context window around a match: `before` chars ahead of it, `after` chars past its end.
pub fn context_window(
    text: &str,
    found: usize,
    match_len: usize,
    before: usize,
    after: usize,
) -> (usize, &str) {
    let start = back_chars(text, found, before);
    let end = forward_chars(text, found + match_len, after);
    (start, &text[start..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_clamp_to_document_bounds() {
        let text = "abc ABC def";
        let (start, window) = context_window(text, 4, 3, 100, 200);
        assert_eq!(start, 0);
        assert_eq!(window, text);
    }

    #[test]
    fn char_steps_respect_multibyte_text() {
        let text = "héllo wörld";
        let pos = text.find('w').unwrap();
        let back = back_chars(text, pos, 3);
        assert_eq!(&text[back..pos], "lo ");
        let fwd = forward_chars(text, pos, 2);
        assert_eq!(&text[pos..fwd], "wö");
    }

    #[test]
    fn find_all_is_case_insensitive_and_non_overlapping() {
        let hits = find_all_ignore_case("ABC Corp. and abc corp. and Abc CORP.", "abc corp.");
        assert_eq!(hits, vec![0, 14, 28]);
        assert!(find_all_ignore_case("aaaa", "aa").len() == 2);
        assert!(find_all_ignore_case("anything", "").is_empty());
    }
}
