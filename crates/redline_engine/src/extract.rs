use std::sync::Arc;
use std::thread;

use once_cell::sync::Lazy;
use redline_logging::{redline_debug, redline_warn};
use regex::Regex;

use crate::codec::{DocumentCodec, Line, Page};
use crate::markup::{escape_html, SPACER, STYLESHEET};

static NUMBERED_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.(\d+\.?)?\s+[A-Z]").expect("numbered heading regex"));
static CLAUSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+\.|[a-z]\))").expect("clause regex"));

pub const SIGNATURE_KEYWORDS: &[&str] = &["signature", "signed by", "dated", "provider:", "client:"];

const CENTER_TOLERANCE: f32 = 50.0;
const CENTERED_MAX_WIDTH: f32 = 0.7;
const INDENT_THRESHOLD: f32 = 100.0;
const BOLD_FLAG: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading,
    Paragraph,
    Clause,
    Signature,
    Indent,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceLocation {
    pub page: usize,
    pub block: usize,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
    pub location: Option<SourceLocation>,
    pub centered: bool,
}

impl Block {
    fn element_id(&self) -> Option<String> {
        self.location
            .map(|loc| format!("elem_{}_{}_{}", loc.page, loc.block, loc.y))
    }

    fn to_html(&self) -> String {
        if self.text.is_empty() {
            return SPACER.to_string();
        }
        let id = self
            .element_id()
            .map(|id| format!(" id=\"{id}\""))
            .unwrap_or_default();
        let text = escape_html(&self.text);
        match self.kind {
            BlockKind::Signature => format!("<div{id} class=\"signature\">{text}</div>"),
            BlockKind::Heading if self.centered => {
                format!("<h1{id} class=\"heading\" align=\"center\">{text}</h1>")
            }
            BlockKind::Heading => format!("<h2{id} class=\"heading\">{text}</h2>"),
            BlockKind::Clause => format!("<div{id} class=\"clause\">{text}</div>"),
            BlockKind::Indent => format!("<div{id} class=\"indent\">{text}</div>"),
            BlockKind::Paragraph => format!("<div{id} class=\"paragraph\">{text}</div>"),
        }
    }
}

/// Ordered blocks of one document. A blank-text block is a vertical spacer.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupTree {
    pub blocks: Vec<Block>,
    /// Single-block plain-text form produced when structural decoding fails.
    pub preformatted: bool,
}

impl MarkupTree {
    pub fn plain(text: &str) -> Self {
        Self {
            blocks: vec![Block {
                kind: BlockKind::Paragraph,
                text: text.to_string(),
                location: None,
                centered: false,
            }],
            preformatted: true,
        }
    }

    pub fn to_html(&self) -> String {
        if self.preformatted {
            let text: String = self.blocks.iter().map(|b| b.text.as_str()).collect();
            return format!(
                "<!DOCTYPE html><html><body><pre>{}</pre></body></html>",
                escape_html(&text)
            );
        }
        let mut parts = Vec::with_capacity(self.blocks.len() + 2);
        parts.push(format!(
            "<!DOCTYPE html><html><head><style>{STYLESHEET}</style></head><body>"
        ));
        parts.extend(self.blocks.iter().map(Block::to_html));
        parts.push("</body></html>".to_string());
        parts.join("\n")
    }
}

/// What a job works on: the flat text, the block tree, and its rendered markup.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub flat_text: String,
    pub markup: MarkupTree,
    pub html: String,
}

/// Turns document bytes into flat text and a classified block tree.
#[derive(Clone)]
pub struct StructuralExtractor {
    codec: Arc<dyn DocumentCodec>,
}

impl StructuralExtractor {
    pub fn new(codec: Arc<dyn DocumentCodec>) -> Self {
        Self { codec }
    }

    /// Never fails: structural problems degrade to a single preformatted block,
    /// and flat text falls back to a lossy UTF-8 read.
    pub fn extract(&self, bytes: &[u8]) -> Extraction {
        let flat_text = match self.codec.decode_text(bytes) {
            Ok(text) => text,
            Err(err) => {
                redline_warn!("Plain text decode failed, reading bytes lossily: {err}");
                String::from_utf8_lossy(bytes).into_owned()
            }
        };

        let markup = match self.structural(bytes) {
            Some(tree) => tree,
            None => MarkupTree::plain(&flat_text),
        };
        let html = markup.to_html();
        redline_debug!(
            "Extracted {} chars of text and {} blocks",
            flat_text.chars().count(),
            markup.blocks.len()
        );

        Extraction {
            flat_text,
            markup,
            html,
        }
    }

    fn structural(&self, bytes: &[u8]) -> Option<MarkupTree> {
        let pages = match self.codec.decode_pages(bytes) {
            Ok(pages) => pages,
            Err(err) => {
                redline_warn!("Structural decode failed, using plain text: {err}");
                return None;
            }
        };

        let workers = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
            .min(pages.len())
            .max(1);
        let per_worker = pages.len().div_ceil(workers).max(1);

        let classified = thread::scope(|scope| {
            let handles: Vec<_> = pages
                .chunks(per_worker)
                .enumerate()
                .map(|(group, slice)| {
                    scope.spawn(move || {
                        slice
                            .iter()
                            .enumerate()
                            .flat_map(|(offset, page)| {
                                classify_page(group * per_worker + offset, page)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().ok())
                .collect::<Option<Vec<_>>>()
        });

        match classified {
            Some(groups) => Some(MarkupTree {
                blocks: groups.into_iter().flatten().collect(),
                preformatted: false,
            }),
            None => {
                redline_warn!("Page classification panicked, using plain text");
                None
            }
        }
    }
}

fn classify_page(page_number: usize, page: &Page) -> Vec<Block> {
    let mut blocks = Vec::new();
    for text_block in &page.blocks {
        for line in &text_block.lines {
            if let Some(block) = classify_line(page_number, text_block.number, page.width, line) {
                blocks.push(block);
            }
        }
    }
    blocks
}

/// Classify one positioned line. Lines without spans produce nothing; blank
/// lines become spacers.
pub fn classify_line(page: usize, block: usize, page_width: f32, line: &Line) -> Option<Block> {
    let first = line.spans.first()?;
    let text = line.text();
    let location = Some(SourceLocation {
        page,
        block,
        y: first.origin_y,
    });

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Block {
            kind: BlockKind::Paragraph,
            text: String::new(),
            location,
            centered: false,
        });
    }

    let x0 = line.spans.iter().map(|s| s.x0).fold(f32::INFINITY, f32::min);
    let x1 = line.spans.iter().map(|s| s.x1).fold(f32::NEG_INFINITY, f32::max);
    let width = x1 - x0;
    let center = x0 + width / 2.0;
    let centered = (center - page_width / 2.0).abs() < CENTER_TOLERANCE
        && width < page_width * CENTERED_MAX_WIDTH;

    let bold = line
        .spans
        .iter()
        .any(|s| s.font.to_lowercase().contains("bold") || s.flags & BOLD_FLAG != 0);
    let heading = bold
        || is_all_caps(&text)
        || trimmed.ends_with(':')
        || NUMBERED_HEADING_RE.is_match(trimmed);
    let lower = text.to_lowercase();
    let signature = SIGNATURE_KEYWORDS.iter().any(|k| lower.contains(k));
    let clause = CLAUSE_RE.is_match(trimmed);

    let kind = if signature {
        BlockKind::Signature
    } else if heading {
        BlockKind::Heading
    } else if clause {
        BlockKind::Clause
    } else if x0 > INDENT_THRESHOLD {
        BlockKind::Indent
    } else {
        BlockKind::Paragraph
    };

    Some(Block {
        kind,
        text,
        location,
        centered: kind == BlockKind::Heading && centered,
    })
}

/// True when the text has letters and none of them is lowercase.
pub fn is_all_caps(text: &str) -> bool {
    let mut cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            cased = true;
        }
    }
    cased
}
