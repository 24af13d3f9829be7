use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use ego_tree::{NodeId, NodeRef};
use once_cell::sync::Lazy;
use redline_logging::{redline_debug, redline_info, redline_warn};
use scraper::{Html, Node, Selector};
use thiserror::Error;

use crate::markup::{escape_html, is_void_element, preformatted_document, wrap_document};

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("body selector"));

/// Responses shorter than this share of the original text are not trusted.
pub const MIN_LENGTH_RATIO: f64 = 0.3;
/// Allowed relative length difference for a heuristic line match.
pub const LINE_LENGTH_TOLERANCE: f64 = 0.3;
const PREFIX_CHARS: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("original markup has no body")]
    MissingBody,
    #[error("reconciled document is empty")]
    EmptyOutput,
}

/// Merges edited text back into the original document markup.
pub trait Reconciler: Send + Sync {
    fn reconcile(&self, original_markup: &str, edited: &str) -> Result<String, ReconcileError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlReconciler;

impl Reconciler for HtmlReconciler {
    fn reconcile(&self, original_markup: &str, edited: &str) -> Result<String, ReconcileError> {
        let cleaned = clean_response(edited);
        if looks_like_markup(cleaned) {
            redline_info!("Response is markup; using it directly");
            return Ok(if has_document_shell(cleaned) {
                cleaned.to_string()
            } else {
                wrap_document(cleaned)
            });
        }

        let document = Html::parse_document(original_markup);
        let body = document
            .select(&BODY)
            .next()
            .ok_or(ReconcileError::MissingBody)?;
        let original_text: String = body.text().collect();
        let original_len = original_text.chars().count();
        let edited_len = cleaned.chars().count();
        if (edited_len as f64) < original_len as f64 * MIN_LENGTH_RATIO {
            redline_warn!(
                "Response of {edited_len} chars is too short against {original_len}; keeping original markup"
            );
            return Ok(original_markup.to_string());
        }

        let nodes: Vec<(NodeId, String)> = body
            .descendants()
            .filter_map(|node| match node.value() {
                Node::Text(text) if !text.trim().is_empty() => {
                    Some((node.id(), text.trim().to_string()))
                }
                _ => None,
            })
            .collect();
        let replacements = match_lines(&nodes, cleaned);
        redline_debug!(
            "Matched {} of {} text nodes for replacement",
            replacements.len(),
            nodes.len()
        );

        let mut out = String::with_capacity(original_markup.len());
        write_node(document.tree.root(), &replacements, &mut out);
        if out.trim().is_empty() {
            return Err(ReconcileError::EmptyOutput);
        }
        Ok(out)
    }
}

/// Never fails: errors and panics inside `reconciler` fall back to the edited
/// text in a plain container.
pub fn reconcile_or_fallback(
    reconciler: &dyn Reconciler,
    original_markup: &str,
    edited: &str,
) -> String {
    match catch_unwind(AssertUnwindSafe(|| {
        reconciler.reconcile(original_markup, edited)
    })) {
        Ok(Ok(markup)) if !markup.trim().is_empty() => markup,
        Ok(Ok(_)) => {
            redline_warn!("Reconciliation produced nothing; using plain fallback");
            preformatted_document(edited)
        }
        Ok(Err(err)) => {
            redline_warn!("Reconciliation failed ({err}); using plain fallback");
            preformatted_document(edited)
        }
        Err(_) => {
            redline_warn!("Reconciliation panicked; using plain fallback");
            preformatted_document(edited)
        }
    }
}

/// Strip one pair of wrapping double quotes and any html code fence.
pub fn clean_response(response: &str) -> &str {
    let mut cleaned = response.trim();
    if cleaned.len() >= 2 && cleaned.starts_with('"') && cleaned.ends_with('"') {
        cleaned = &cleaned[1..cleaned.len() - 1];
    }
    if let Some(rest) = cleaned.strip_prefix("```html") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

pub fn looks_like_markup(text: &str) -> bool {
    text.contains("<!DOCTYPE")
        || text.contains("<html")
        || (text.contains("<div") && text.contains("</div>"))
}

fn has_document_shell(text: &str) -> bool {
    text.starts_with("<!DOCTYPE") || text.starts_with("<html")
}

/// Pair edited lines with original text nodes: exact text first, then a
/// node of similar length sharing the same opening characters. Lines with
/// no match are dropped.
fn match_lines(nodes: &[(NodeId, String)], edited: &str) -> HashMap<NodeId, String> {
    let mut exact: HashMap<&str, Vec<usize>> = HashMap::new();
    for (pos, (_, text)) in nodes.iter().enumerate() {
        exact.entry(text.as_str()).or_default().push(pos);
    }

    let mut used = HashSet::new();
    let mut replacements = HashMap::new();
    for line in edited.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let exact_hit = exact
            .get(line)
            .and_then(|candidates| candidates.iter().copied().find(|p| !used.contains(p)));
        if let Some(pos) = exact_hit {
            used.insert(pos);
            continue;
        }

        let heuristic_hit = nodes
            .iter()
            .enumerate()
            .find(|(pos, (_, text))| !used.contains(pos) && similar(text, line))
            .map(|(pos, _)| pos);
        if let Some(pos) = heuristic_hit {
            used.insert(pos);
            if nodes[pos].1 != line {
                replacements.insert(nodes[pos].0, line.to_string());
            }
        }
    }
    replacements
}

fn similar(original: &str, edited: &str) -> bool {
    let a = original.chars().count() as f64;
    let b = edited.chars().count() as f64;
    if (a - b).abs() > a.max(b) * LINE_LENGTH_TOLERANCE {
        return false;
    }
    let prefix = |s: &str| -> String {
        s.chars()
            .take(PREFIX_CHARS)
            .flat_map(char::to_lowercase)
            .collect()
    };
    prefix(original) == prefix(edited)
}

fn write_node(node: NodeRef<'_, Node>, replacements: &HashMap<NodeId, String>, out: &mut String) {
    match node.value() {
        Node::Document | Node::Fragment => write_children(node, replacements, out),
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            out.push('>');
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Text(text) => {
            if let Some(replacement) = replacements.get(&node.id()) {
                out.push_str(&escape_html(replacement));
            } else if in_raw_text_element(node) {
                out.push_str(text);
            } else {
                out.push_str(&escape_html(text));
            }
        }
        Node::Element(element) => {
            out.push('<');
            out.push_str(element.name());
            for (name, value) in element.attrs() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_html(value));
                out.push('"');
            }
            out.push('>');
            if is_void_element(element.name()) {
                return;
            }
            write_children(node, replacements, out);
            out.push_str("</");
            out.push_str(element.name());
            out.push('>');
        }
        Node::ProcessingInstruction(_) => {}
    }
}

fn write_children(
    node: NodeRef<'_, Node>,
    replacements: &HashMap<NodeId, String>,
    out: &mut String,
) {
    for child in node.children() {
        write_node(child, replacements, out);
    }
}

fn in_raw_text_element(node: NodeRef<'_, Node>) -> bool {
    node.parent()
        .and_then(|parent| parent.value().as_element().map(|e| e.name().to_string()))
        .is_some_and(|name| name == "style" || name == "script")
}
