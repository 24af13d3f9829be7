use crate::{Chunk, Target};

pub const STRUCTURE_MARKERS: &[&str] = &[
    "section",
    "article",
    "clause",
    "paragraph",
    "parties",
    "agreement",
    "witnesseth",
    "whereas",
    "term",
    "termination",
    "payment",
    "services",
    "obligations",
    "governing law",
    "liability",
    "indemnification",
];

const FULL_MATCH: i32 = 5;
const FIRST_THIRD_BONUS: i32 = 2;
const MIDDLE_THIRD_BONUS: i32 = 1;
const HALF_MATCH: i32 = 2;
const PARTIAL_MIN_CHARS: usize = 10;

/// Relevance of one chunk's text to the located targets.
pub fn score_chunk(text: &str, targets: &[Target]) -> i32 {
    let lower = text.to_ascii_lowercase();
    let len = lower.len();
    let mut score = 0;

    for target in targets {
        let needle = target.text.to_ascii_lowercase();
        if let Some(pos) = lower.find(&needle) {
            score += FULL_MATCH;
            if pos < len / 3 {
                score += FIRST_THIRD_BONUS;
            } else if pos < len * 2 / 3 {
                score += MIDDLE_THIRD_BONUS;
            }
        } else if needle.chars().count() > PARTIAL_MIN_CHARS {
            let mut mid = needle.len() / 2;
            while !needle.is_char_boundary(mid) {
                mid -= 1;
            }
            let (first, second) = needle.split_at(mid);
            if lower.contains(first) {
                score += HALF_MATCH;
            }
            if lower.contains(second) {
                score += HALF_MATCH;
            }
        }
    }

    score
        + STRUCTURE_MARKERS
            .iter()
            .filter(|marker| lower.contains(**marker))
            .count() as i32
}

/// Reorder chunks for dispatch, most relevant first.
///
/// Nothing is dropped or resized. Ties keep ascending index order. With no
/// targets every chunk has equal priority and index order is kept.
pub fn prioritize(mut chunks: Vec<Chunk>, targets: &[Target]) -> Vec<Chunk> {
    if targets.is_empty() {
        for chunk in &mut chunks {
            chunk.priority = 0;
        }
        chunks.sort_by_key(|c| c.index);
        return chunks;
    }

    for chunk in &mut chunks {
        chunk.priority = score_chunk(&chunk.text, targets);
    }
    chunks.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.index.cmp(&b.index)));
    chunks
}
