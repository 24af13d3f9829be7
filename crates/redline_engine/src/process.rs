use futures_util::stream::{self, StreamExt};
use redline_core::Chunk;
use redline_logging::{redline_error, redline_info, redline_warn};

use crate::dispatch::Dispatcher;
use crate::{ChunkResult, InferenceError, InferenceFailure, ProgressSink};

pub const PROCESS_PROGRESS_START: u8 = 40;
pub const PROCESS_PROGRESS_END: u8 = 70;

/// Run every chunk through the dispatcher, at most `concurrency` at a time, in
/// the order given. Results come back sorted by original index.
///
/// A credential failure aborts the whole run; any other failure leaves that
/// chunk unchanged.
pub async fn process_all(
    dispatcher: &Dispatcher,
    chunks: &[Chunk],
    instruction: &str,
    concurrency: usize,
    markup: bool,
    sink: &dyn ProgressSink,
) -> Result<Vec<ChunkResult>, InferenceError> {
    let total = chunks.len();
    let mut results = Vec::with_capacity(total);
    let pending: Vec<_> = chunks
        .iter()
        .map(|chunk| async move {
            let outcome = dispatcher
                .process_chunk(chunk, total, instruction, markup)
                .await;
            (chunk, outcome)
        })
        .collect();
    let mut in_flight = stream::iter(pending).buffer_unordered(concurrency.max(1));

    let mut done = 0usize;
    while let Some((chunk, outcome)) = in_flight.next().await {
        done += 1;
        match outcome {
            Ok(result) => results.push(result),
            Err(err) if err.kind == InferenceFailure::CredentialOrAuth => {
                redline_error!("Chunk {} failed with fatal error: {err}", chunk.index + 1);
                return Err(err);
            }
            Err(err) => {
                redline_warn!(
                    "Chunk {} failed ({err}); keeping original text",
                    chunk.index + 1
                );
                results.push(ChunkResult::unchanged(chunk));
            }
        }
        sink.progress(
            progress_for(done, total),
            format!("Processed chunk {done} of {total}"),
        );
    }

    results.sort_by_key(|result| result.index);
    let changed = results.iter().filter(|r| r.changed).count();
    redline_info!("Processed {total} chunks, {changed} changed");
    Ok(results)
}

fn progress_for(done: usize, total: usize) -> u8 {
    let span = (PROCESS_PROGRESS_END - PROCESS_PROGRESS_START) as usize;
    PROCESS_PROGRESS_START + (span * done / total.max(1)) as u8
}

/// Join results in index order, keeping each overlap region once.
///
/// The overlap shared by two neighbours is taken from the later chunk. An
/// edited earlier chunk is cut where the untouched overlap text last appears
/// in its response, or else where its tail matches the head of the next
/// response. When neither works the whole response is kept and the next
/// piece follows after a blank line.
///
/// Neighbours are joined with no separator of their own; a paragraph
/// separator is inserted only where no seam is found.
pub fn aggregate(chunks: &[Chunk], results: &[ChunkResult]) -> String {
    let mut ordered_chunks: Vec<&Chunk> = chunks.iter().collect();
    ordered_chunks.sort_by_key(|chunk| chunk.index);
    let mut ordered_results: Vec<&ChunkResult> = results.iter().collect();
    ordered_results.sort_by_key(|result| result.index);

    let mut out = String::new();
    for (pos, result) in ordered_results.iter().enumerate() {
        let chunk = ordered_chunks.iter().find(|c| c.index == result.index);
        let next_overlap = ordered_chunks
            .iter()
            .find(|c| c.index == result.index + 1)
            .map_or(0, |next| next.overlap);
        let next_text = ordered_results
            .get(pos + 1)
            .filter(|next| next.index == result.index + 1)
            .map(|next| next.text.as_str());

        let piece = match chunk {
            Some(chunk) if next_overlap > 0 && next_overlap <= chunk.text.len() => {
                let cut = chunk.text.len() - next_overlap;
                if !result.changed {
                    Some(&chunk.text[..cut])
                } else {
                    let overlap_text = &chunk.text[cut..];
                    result
                        .text
                        .rfind(overlap_text)
                        .or_else(|| {
                            next_text.and_then(|next| shared_seam(&result.text, next, next_overlap))
                        })
                        .map(|at| &result.text[..at])
                }
            }
            _ => Some(result.text.as_str()),
        };

        match piece {
            Some(piece) => out.push_str(piece),
            None => {
                out.push_str(&result.text);
                if pos + 1 < ordered_results.len() {
                    out.push_str("\n\n");
                }
            }
        }
    }
    out
}

/// Offset in `text` where its longest tail that also opens `next` begins.
/// Only tails of at least half the expected overlap count.
fn shared_seam(text: &str, next: &str, overlap: usize) -> Option<usize> {
    let limit = text.len().min(next.len()).min(overlap * 2);
    let shortest = overlap.div_ceil(2).max(1);
    (shortest..=limit)
        .rev()
        .filter(|&len| next.is_char_boundary(len))
        .find(|&len| text.ends_with(&next[..len]))
        .map(|len| text.len() - len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use redline_core::{reassemble, split_text, SplitSettings};

    fn text() -> String {
        (0..40)
            .map(|i| format!("Clause {i}: the Supplier delivers lot {i} on time."))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn unchanged_results_reproduce_source() {
        let source = text();
        let chunks = split_text(
            &source,
            SplitSettings {
                max_size: 300,
                overlap: 60,
            },
        );
        assert!(chunks.len() > 2);
        let results: Vec<_> = chunks.iter().map(ChunkResult::unchanged).collect();
        assert_eq!(aggregate(&chunks, &results), source);
        assert_eq!(reassemble(&chunks), source);
    }

    fn split(source: &str) -> Vec<Chunk> {
        split_text(
            source,
            SplitSettings {
                max_size: 300,
                overlap: 60,
            },
        )
    }

    #[test]
    fn edited_chunk_drops_its_copy_of_the_overlap() {
        let source = text();
        let chunks = split(&source);
        let mut results: Vec<_> = chunks.iter().map(ChunkResult::unchanged).collect();
        results[0].text = results[0].text.replace("Clause 0:", "Article 0:");
        results[0].changed = true;

        let merged = aggregate(&chunks, &results);
        assert_eq!(merged, source.replacen("Clause 0:", "Article 0:", 1));
    }

    #[test]
    fn rewritten_overlap_keeps_both_copies() {
        let source = text();
        let chunks = split(&source);
        let mut results: Vec<_> = chunks.iter().map(ChunkResult::unchanged).collect();
        results[0].text = "A completely rewritten opening part.".to_string();
        results[0].changed = true;

        let merged = aggregate(&chunks, &results);
        let rest = &source[chunks[1].start..];
        assert_eq!(merged, format!("A completely rewritten opening part.\n\n{rest}"));
    }

    #[test]
    fn progress_spans_forty_to_seventy() {
        assert_eq!(progress_for(0, 4), 40);
        assert_eq!(progress_for(2, 4), 55);
        assert_eq!(progress_for(4, 4), 70);
    }
}
