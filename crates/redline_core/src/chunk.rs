use crate::textutil::{back_chars, char_len, forward_chars};

/// Separators tried in order when choosing where a chunk ends; when none
/// fits, the chunk is cut at a char boundary.
pub const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSettings {
    /// Maximum chunk size in chars.
    pub max_size: usize,
    /// Chars repeated at the trailing edge of a chunk and the leading edge of its successor.
    pub overlap: usize,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            max_size: 25_000,
            overlap: 5_000,
        }
    }
}

/// A contiguous slice of the source text, dispatched as one inference unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    /// Byte offset of the chunk in the source text.
    pub start: usize,
    /// Leading bytes shared with the previous chunk.
    pub overlap: usize,
    pub priority: i32,
}

impl Chunk {
    pub fn new(index: usize, text: impl Into<String>, start: usize, overlap: usize) -> Self {
        Self {
            index,
            text: text.into(),
            start,
            overlap,
            priority: 0,
        }
    }

    /// The part of this chunk that no earlier chunk carries.
    pub fn fresh_text(&self) -> &str {
        &self.text[self.overlap..]
    }
}

pub fn single_chunk(text: impl Into<String>) -> Vec<Chunk> {
    vec![Chunk::new(0, text, 0, 0)]
}

/// Split `text` into bounded, overlapping chunks.
///
/// Chunks are exact slices of the input, so [`reassemble`] reproduces it.
pub fn split_text(text: &str, settings: SplitSettings) -> Vec<Chunk> {
    let max_size = settings.max_size.max(1);
    let overlap = settings.overlap.min(max_size / 2);

    if char_len(text) < max_size {
        return single_chunk(text);
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut lead_overlap = 0;
    loop {
        let limit = forward_chars(text, start, max_size);
        if limit >= text.len() {
            chunks.push(Chunk::new(chunks.len(), &text[start..], start, lead_overlap));
            break;
        }

        // The end must leave more than `overlap` chars behind it so the next start advances.
        let min_end = forward_chars(text, start, overlap + 1);
        let end = find_break(text, min_end, limit);
        chunks.push(Chunk::new(
            chunks.len(),
            &text[start..end],
            start,
            lead_overlap,
        ));

        let next = snap_to_word_start(text, back_chars(text, end, overlap), end);
        lead_overlap = end - next;
        start = next;
    }
    chunks
}

fn find_break(text: &str, lo: usize, hi: usize) -> usize {
    if lo >= hi {
        return hi;
    }
    let window = &text[lo..hi];
    SEPARATORS
        .iter()
        .find_map(|sep| window.rfind(sep).map(|p| lo + p + sep.len()))
        .unwrap_or(hi)
}

/// Move `from` forward past the next whitespace so the overlap starts on a word.
fn snap_to_word_start(text: &str, from: usize, end: usize) -> usize {
    if from == 0 || text[..from].ends_with(char::is_whitespace) {
        return from;
    }
    text[from..end]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(idx, c)| from + idx + c.len_utf8())
        .unwrap_or(from)
}

/// Concatenate chunks in index order, keeping only one copy of each overlap.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| c.index);
    ordered.iter().map(|c| c.fresh_text()).collect()
}
