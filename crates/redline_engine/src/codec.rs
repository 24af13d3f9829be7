use thiserror::Error;

use crate::decode::{decode_text, DecodeError};
use crate::markup::{escape_html, STYLESHEET};

/// A run of text sharing one font, with its horizontal extent and baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub text: String,
    pub font: String,
    pub flags: u32,
    pub x0: f32,
    pub x1: f32,
    pub origin_y: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Line {
    pub spans: Vec<Span>,
}

impl Line {
    pub fn text(&self) -> String {
        self.spans.iter().map(|span| span.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBlock {
    pub number: usize,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub width: f32,
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    Heading,
    Signature,
    Normal,
}

/// Input to the simple paragraph renderer used when markup rendering fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledParagraph {
    pub style: ParagraphStyle,
    pub text: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("nothing to render")]
    Empty,
    #[error("render backend failed: {0}")]
    Backend(String),
}

/// Boundary to the document format: positioned primitives in, rendered bytes out.
pub trait DocumentCodec: Send + Sync {
    fn decode_pages(&self, bytes: &[u8]) -> Result<Vec<Page>, DecodeError>;

    /// Plain full-text decode, independent of [`DocumentCodec::decode_pages`].
    fn decode_text(&self, bytes: &[u8]) -> Result<String, DecodeError>;

    fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError>;

    fn render_paragraphs(&self, paragraphs: &[StyledParagraph]) -> Result<Vec<u8>, RenderError>;

    /// File extension of rendered output.
    fn output_extension(&self) -> &'static str {
        "html"
    }
}

pub const LETTER_WIDTH: f32 = 612.0;
const LEFT_MARGIN: f32 = 72.0;
const TOP_MARGIN: f32 = 72.0;
const CHAR_WIDTH: f32 = 6.0;
const LINE_HEIGHT: f32 = 12.0;
const LINES_PER_PAGE: usize = 54;

/// Plain-text documents laid out on US-Letter pages in a fixed-pitch font;
/// renders to UTF-8 HTML.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextDocumentCodec;

impl TextDocumentCodec {
    fn layout_line(text: &str, row: usize) -> Line {
        let indent = text.chars().take_while(|c| c.is_whitespace()).count();
        let content = text.trim();
        let x0 = LEFT_MARGIN + indent as f32 * CHAR_WIDTH;
        let x1 = x0 + content.chars().count() as f32 * CHAR_WIDTH;
        Line {
            spans: vec![Span {
                text: content.to_string(),
                font: "Courier".to_string(),
                flags: 0,
                x0,
                x1,
                origin_y: TOP_MARGIN + row as f32 * LINE_HEIGHT,
            }],
        }
    }
}

impl DocumentCodec for TextDocumentCodec {
    fn decode_pages(&self, bytes: &[u8]) -> Result<Vec<Page>, DecodeError> {
        let text = decode_text(bytes)?.text;
        let lines: Vec<&str> = text.lines().collect();

        let mut pages = Vec::new();
        for page_lines in lines.chunks(LINES_PER_PAGE) {
            let mut blocks = Vec::new();
            let mut current = TextBlock::default();
            for (row, raw) in page_lines.iter().enumerate() {
                let line = Self::layout_line(raw.trim_end_matches('\r'), row);
                let blank = raw.trim().is_empty();
                current.lines.push(line);
                if blank {
                    let number = current.number + 1;
                    blocks.push(std::mem::take(&mut current));
                    current.number = number;
                }
            }
            if !current.lines.is_empty() {
                blocks.push(current);
            }
            pages.push(Page {
                width: LETTER_WIDTH,
                blocks,
            });
        }
        Ok(pages)
    }

    fn decode_text(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        decode_text(bytes).map(|decoded| decoded.text)
    }

    fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        if markup.trim().is_empty() {
            return Err(RenderError::Empty);
        }
        Ok(markup.as_bytes().to_vec())
    }

    fn render_paragraphs(&self, paragraphs: &[StyledParagraph]) -> Result<Vec<u8>, RenderError> {
        if paragraphs.is_empty() {
            return Err(RenderError::Empty);
        }
        let mut out = String::new();
        out.push_str("<!DOCTYPE html><html><head><style>");
        out.push_str(STYLESHEET);
        out.push_str("</style></head><body>\n");
        for paragraph in paragraphs {
            let text = escape_html(&paragraph.text);
            match paragraph.style {
                ParagraphStyle::Heading => {
                    out.push_str(&format!("<h2 class=\"heading\">{text}</h2>\n"));
                }
                ParagraphStyle::Signature => {
                    out.push_str(&format!("<div class=\"signature\">{text}</div>\n"));
                }
                ParagraphStyle::Normal => {
                    let text = text.replace('\n', "<br/>");
                    out.push_str(&format!("<p class=\"paragraph\">{text}</p>\n"));
                }
            }
        }
        out.push_str("</body></html>");
        Ok(out.into_bytes())
    }
}
