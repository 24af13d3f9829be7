use once_cell::sync::Lazy;
use regex::Regex;

use crate::textutil::{char_len, context_window, find_all_ignore_case, find_ignore_case};

/// A context window of the document that an edit directive likely refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub text: String,
    /// Byte offset of the window start in the flat text.
    pub offset: usize,
}

pub const ACTION_VERBS: &[&str] = &[
    "change", "modify", "replace", "update", "set", "remove", "delete", "add", "insert",
];

pub const CONTRACT_FIELDS: &[&str] = &[
    "effective date",
    "term",
    "termination",
    "governing law",
    "state",
    "jurisdiction",
    "payment terms",
    "client",
    "provider",
    "customer",
    "representative",
    "fee",
    "price",
    "pricing",
    "deliverable",
    "party",
    "parties",
    "section",
    "article",
    "clause",
    "paragraph",
    "agreement",
    "contract",
];

const MATCH_BEFORE: usize = 100;
const MATCH_AFTER: usize = 200;
const FIELD_BEFORE: usize = 50;
const PARTIAL_CONTEXT: usize = 100;

static DOUBLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*)""#).expect("double quoted"));
static SINGLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'([^']*)'").expect("single quoted"));
static DIRECTIVE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n|\d+\.|\s*-\s*").expect("directive split"));
static ANY_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"]([^'"]+)['"]"#).expect("any quoted"));
static COMPANY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?:Company|Provider|Client|Vendor|Contractor|Supplier|Customer)\s+Name.*?['"]([^'"]+)['"]"#,
        r#"[Cc]hange\s+(?:the\s+)?([^'"].*?(?:Inc|LLC|Ltd|Corporation|Corp|Company|Co))[^'"].*?from"#,
        r#"[Uu]pdate\s+(?:the\s+)?([^'"].*?(?:Inc|LLC|Ltd|Corporation|Corp|Company|Co))[^'"].*?from"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("company pattern"))
    .collect()
});

/// Find the spans of `text` an instruction most likely targets.
///
/// Returns an empty list when nothing matches lexically; callers then treat
/// every chunk as equally relevant.
pub fn locate_targets(instruction: &str, text: &str) -> Vec<Target> {
    let mut windows = Vec::new();
    quoted_targets(instruction, text, &mut windows);
    directive_targets(instruction, text, &mut windows);
    field_targets(instruction, text, &mut windows);
    let mut targets = dedupe_targets(windows);

    // Entity paragraphs can span the whole text; they never displace a window.
    for target in entity_targets(instruction, text) {
        if !target.text.is_empty() && !targets.iter().any(|k| k.text.contains(&target.text)) {
            targets.push(target);
        }
    }
    targets
}

fn push_window(
    targets: &mut Vec<Target>,
    text: &str,
    found: usize,
    match_len: usize,
    before: usize,
    after: usize,
) {
    let (offset, window) = context_window(text, found, match_len, before, after);
    targets.push(Target {
        text: window.to_string(),
        offset,
    });
}

fn quoted_targets(instruction: &str, text: &str, targets: &mut Vec<Target>) {
    let quoted = DOUBLE_QUOTED_RE
        .captures_iter(instruction)
        .chain(SINGLE_QUOTED_RE.captures_iter(instruction))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()));

    for phrase in quoted {
        if char_len(phrase) <= 3 {
            continue;
        }
        for found in find_all_ignore_case(text, phrase) {
            push_window(targets, text, found, phrase.len(), MATCH_BEFORE, MATCH_AFTER);
        }
    }
}

fn directive_targets(instruction: &str, text: &str, targets: &mut Vec<Target>) {
    for part in DIRECTIVE_SPLIT_RE.split(instruction) {
        let part = part.trim();
        if part.len() < 5 {
            continue;
        }
        let lower = part.to_ascii_lowercase();
        for verb in ACTION_VERBS {
            let Some(verb_pos) = lower.find(verb) else {
                continue;
            };
            if verb_pos + verb.len() + 1 >= part.len() {
                continue;
            }
            let phrase = part[verb_pos + verb.len()..].trim();
            if phrase.len() <= 3 {
                continue;
            }
            let search = phrase.split_whitespace().take(3).collect::<Vec<_>>().join(" ");
            if search.len() <= 3 {
                continue;
            }
            if let Some(found) = find_ignore_case(text, &search) {
                push_window(targets, text, found, search.len(), MATCH_BEFORE, MATCH_AFTER);
            }
        }
    }
}

fn field_targets(instruction: &str, text: &str, targets: &mut Vec<Target>) {
    let lower = instruction.to_ascii_lowercase();
    for field in CONTRACT_FIELDS {
        if !lower.contains(field) {
            continue;
        }
        for found in find_all_ignore_case(text, field) {
            push_window(targets, text, found, field.len(), FIELD_BEFORE, MATCH_AFTER);
        }
    }
}

/// Entity names the instruction mentions: quoted strings and company-name
/// phrases, in first-seen order without duplicates.
pub fn extract_key_entities(instruction: &str) -> Vec<String> {
    let mut entities: Vec<String> = Vec::new();
    let quoted = ANY_QUOTED_RE
        .captures_iter(instruction)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));
    let companies = COMPANY_PATTERNS.iter().flat_map(|re| {
        re.captures_iter(instruction)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .collect::<Vec<_>>()
    });

    for entity in quoted.chain(companies) {
        if char_len(&entity) > 3 && !entities.contains(&entity) {
            entities.push(entity);
        }
    }
    entities
}

fn entity_targets(instruction: &str, text: &str) -> Vec<Target> {
    let mut targets = Vec::new();
    let entities = extract_key_entities(instruction);
    if entities.is_empty() {
        return targets;
    }

    let mut any_found = false;
    for entity in &entities {
        let hits = find_all_ignore_case(text, entity);
        any_found |= !hits.is_empty();
        for found in hits {
            let start = text[..found].rfind("\n\n").map(|p| p + 2).unwrap_or(0);
            let end = text[found..]
                .find("\n\n")
                .map(|p| found + p)
                .unwrap_or(text.len());
            targets.push(Target {
                text: text[start..end].to_string(),
                offset: start,
            });
        }
    }
    if any_found {
        return targets;
    }

    // Nothing matched verbatim: fall back to two-word fragments of each entity.
    for entity in &entities {
        let words: Vec<&str> = entity.split_whitespace().collect();
        for pair in words.windows(2) {
            let partial = pair.join(" ");
            if char_len(&partial) < 5 {
                continue;
            }
            if let Some(found) = find_ignore_case(text, &partial) {
                push_window(
                    &mut targets,
                    text,
                    found,
                    partial.len(),
                    PARTIAL_CONTEXT,
                    PARTIAL_CONTEXT,
                );
            }
        }
    }
    targets
}

/// Containment-based de-duplication, order preserving.
///
/// A target that is a substring of a retained target is dropped; a target
/// that swallows retained ones takes the place of the first of them.
pub fn dedupe_targets(targets: Vec<Target>) -> Vec<Target> {
    let mut kept: Vec<Target> = Vec::with_capacity(targets.len());
    for target in targets {
        if target.text.is_empty() || kept.iter().any(|k| k.text.contains(&target.text)) {
            continue;
        }
        let swallowed: Vec<usize> = kept
            .iter()
            .enumerate()
            .filter(|(_, k)| target.text.contains(&k.text))
            .map(|(idx, _)| idx)
            .collect();
        match swallowed.split_first() {
            None => kept.push(target),
            Some((&first, rest)) => {
                for &idx in rest.iter().rev() {
                    kept.remove(idx);
                }
                kept[first] = target;
            }
        }
    }
    kept
}
