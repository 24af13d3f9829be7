use std::sync::Once;

use pretty_assertions::assert_eq;
use redline_core::{
    dedupe_targets, extract_key_entities, locate_targets, prioritize, split_text, Chunk,
    SplitSettings, Target,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(redline_logging::initialize_for_tests);
}

const FILLER: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua.";

fn supplier_section(n: usize) -> String {
    format!(
        "{FILLER}\n\nDelivery schedule {n}: the supplier ABC Corp. shall deliver batch number {n} of the goods on time and in full, as confirmed in writing by both sides before shipment number {n}.\n\n{FILLER}\n\n"
    )
}

fn filler_section() -> String {
    format!("{FILLER}\n\n{FILLER}\n\n{FILLER}\n\n")
}

/// Three supplier sections interleaved with filler, plus the chunk for each section.
fn company_document() -> (String, Vec<Chunk>) {
    let sections = vec![
        filler_section(),
        supplier_section(0),
        filler_section(),
        supplier_section(1),
        filler_section(),
        supplier_section(2),
    ];
    let mut doc = String::new();
    let mut chunks = Vec::new();
    for (index, section) in sections.iter().enumerate() {
        chunks.push(Chunk::new(index, section.clone(), doc.len(), 0));
        doc.push_str(section);
    }
    (doc, chunks)
}

const COMPANY_INSTRUCTION: &str =
    "Change the company name from 'ABC Corp.' to 'XYZ Technologies, Inc.'";

#[test]
fn quoted_company_name_yields_a_window_per_occurrence() {
    init_logging();
    let (doc, _) = company_document();
    let targets = locate_targets(COMPANY_INSTRUCTION, &doc);

    let occurrences: Vec<usize> = doc.match_indices("ABC Corp.").map(|(i, _)| i).collect();
    assert_eq!(occurrences.len(), 3);
    for pos in occurrences {
        assert!(
            targets
                .iter()
                .any(|t| t.offset <= pos && t.offset + t.text.len() >= pos + "ABC Corp.".len()),
            "occurrence at {pos} not covered by {targets:?}"
        );
    }
}

#[test]
fn chunks_with_the_company_outrank_chunks_without_it() {
    init_logging();
    let (doc, chunks) = company_document();
    let targets = locate_targets(COMPANY_INSTRUCTION, &doc);
    let ordered = prioritize(chunks, &targets);

    let with_name: Vec<i32> = ordered
        .iter()
        .filter(|c| c.text.contains("ABC Corp."))
        .map(|c| c.priority)
        .collect();
    let without_name: Vec<i32> = ordered
        .iter()
        .filter(|c| !c.text.contains("ABC Corp."))
        .map(|c| c.priority)
        .collect();
    assert_eq!(with_name.len(), 3);
    let weakest_hit = with_name.iter().min().copied().unwrap();
    let strongest_miss = without_name.iter().max().copied().unwrap();
    assert!(weakest_hit > strongest_miss);

    let dispatch_order: Vec<usize> = ordered.iter().map(|c| c.index).collect();
    assert_eq!(&dispatch_order[..3], &[1, 3, 5]);
}

/// Roughly 70k chars of single-spaced lines with the company named near 10k, 32k and 52k.
fn single_spaced_document() -> String {
    let mut marks = [10_000, 32_000, 52_000].into_iter().peekable();
    let mut doc = String::new();
    let mut line = 0;
    while doc.len() < 70_000 {
        if marks.next_if(|&mark| doc.len() >= mark).is_some() {
            doc.push_str(&format!("Supplier ABC Corp. ships batch {line} on schedule.\n"));
        }
        doc.push_str(&format!("{FILLER} Line {line}.\n"));
        line += 1;
    }
    doc
}

#[test]
fn single_spaced_document_keeps_occurrence_windows() {
    init_logging();
    let doc = single_spaced_document();
    assert!(!doc.contains("\n\n"));
    let targets = locate_targets(COMPANY_INSTRUCTION, &doc);

    let occurrences: Vec<usize> = doc.match_indices("ABC Corp.").map(|(i, _)| i).collect();
    assert_eq!(occurrences.len(), 3);
    for pos in occurrences {
        assert!(
            targets.iter().any(|t| t.text.len() < 1_000
                && t.offset <= pos
                && t.offset + t.text.len() >= pos + "ABC Corp.".len()),
            "no narrow window around {pos}"
        );
    }

    let chunks = split_text(&doc, SplitSettings::default());
    assert!(chunks.len() >= 3);
    let ordered = prioritize(chunks, &targets);
    let with_name: Vec<i32> = ordered
        .iter()
        .filter(|c| c.text.contains("ABC Corp."))
        .map(|c| c.priority)
        .collect();
    let without_name: Vec<i32> = ordered
        .iter()
        .filter(|c| !c.text.contains("ABC Corp."))
        .map(|c| c.priority)
        .collect();
    assert!(!with_name.is_empty() && !without_name.is_empty());
    let weakest_hit = with_name.iter().min().copied().unwrap();
    let strongest_miss = without_name.iter().max().copied().unwrap();
    assert!(
        weakest_hit > strongest_miss,
        "hits {with_name:?} misses {without_name:?}"
    );
}

#[test]
fn no_lexical_match_returns_empty_list() {
    init_logging();
    let targets = locate_targets("Please make it sound friendlier", "Nothing relevant here.");
    assert!(targets.is_empty());
}

#[test]
fn field_names_locate_every_occurrence() {
    init_logging();
    let doc = "1. Governing law. This deal follows the laws of Ohio.\n\n9. Notices. The governing law clause above applies to notices as well.";
    let targets = locate_targets("Use Texas as the governing law", doc);
    let hits: Vec<usize> = doc
        .to_ascii_lowercase()
        .match_indices("governing law")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(hits.len(), 2);
    for pos in hits {
        assert!(targets
            .iter()
            .any(|t| t.offset <= pos && t.offset + t.text.len() >= pos + 13));
    }
}

#[test]
fn action_verb_phrase_is_searched_in_the_document() {
    init_logging();
    let doc = "The payment due date is the fifth day of each month.";
    let targets = locate_targets("Update payment due date to the tenth", doc);
    assert!(!targets.is_empty());
    assert!(targets[0].text.contains("payment due date"));
}

#[test]
fn dedupe_drops_contained_targets_and_is_idempotent() {
    init_logging();
    let t = |text: &str, offset: usize| Target {
        text: text.to_string(),
        offset,
    };
    let input = vec![
        t("quick brown", 4),
        t("the quick brown fox", 0),
        t("lazy dog", 35),
        t("brown", 10),
        t("lazy dog", 35),
        t("jumps over", 20),
    ];
    let once = dedupe_targets(input);
    assert_eq!(
        once,
        vec![t("the quick brown fox", 0), t("lazy dog", 35), t("jumps over", 20)]
    );
    let twice = dedupe_targets(once.clone());
    assert_eq!(twice, once);
}

#[test]
fn key_entities_come_from_quotes_and_company_phrases() {
    init_logging();
    let entities = extract_key_entities(
        "Update the Acme Widgets Inc name from the old one, and set \"Net 30\" terms",
    );
    assert_eq!(entities, vec!["Net 30".to_string(), "Acme Widgets Inc".to_string()]);
}
