mod common;

use std::sync::Arc;

use common::init_logging;
use pretty_assertions::assert_eq;
use redline_engine::{
    BlockKind, DecodeError, DocumentCodec, Page, RenderError, StructuralExtractor, StyledParagraph,
    TextDocumentCodec,
};

const CONTRACT: &str = "                         SERVICE AGREEMENT

1. Definitions And Scope
2.the fee is fixed
        as set out in the annex
Payment terms:
The Client pays monthly.

Dated this first day of March";

#[test]
fn text_codec_lines_are_classified() {
    init_logging();
    let extraction = StructuralExtractor::new(Arc::new(TextDocumentCodec)).extract(CONTRACT.as_bytes());

    assert_eq!(extraction.flat_text, CONTRACT);
    assert!(!extraction.markup.preformatted);
    let kinds: Vec<_> = extraction
        .markup
        .blocks
        .iter()
        .filter(|b| !b.text.is_empty())
        .map(|b| (b.kind, b.centered))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (BlockKind::Heading, true),
            (BlockKind::Heading, false),
            (BlockKind::Clause, false),
            (BlockKind::Indent, false),
            (BlockKind::Heading, false),
            (BlockKind::Paragraph, false),
            (BlockKind::Signature, false),
        ]
    );
    assert!(extraction.html.contains("align=\"center\">SERVICE AGREEMENT</h1>"));
    assert!(extraction.html.contains("<div style=\"height: 12px;\"></div>"));
}

struct PlainOnlyCodec;

impl DocumentCodec for PlainOnlyCodec {
    fn decode_pages(&self, _: &[u8]) -> Result<Vec<Page>, DecodeError> {
        Err(DecodeError::DecodeFailure {
            encoding: "layout".into(),
            message: "no layout information".into(),
        })
    }
    fn decode_text(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        TextDocumentCodec.decode_text(bytes)
    }
    fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        TextDocumentCodec.render(markup)
    }
    fn render_paragraphs(&self, paragraphs: &[StyledParagraph]) -> Result<Vec<u8>, RenderError> {
        TextDocumentCodec.render_paragraphs(paragraphs)
    }
}

#[test]
fn structural_failure_degrades_to_preformatted_block() {
    let extraction = StructuralExtractor::new(Arc::new(PlainOnlyCodec)).extract(b"Terms & conditions");

    assert_eq!(extraction.flat_text, "Terms & conditions");
    assert!(extraction.markup.preformatted);
    assert_eq!(extraction.markup.blocks.len(), 1);
    assert_eq!(
        extraction.html,
        "<!DOCTYPE html><html><body><pre>Terms &amp; conditions</pre></body></html>"
    );
}

#[test]
fn empty_document_still_yields_an_extraction() {
    let extraction = StructuralExtractor::new(Arc::new(TextDocumentCodec)).extract(b"");
    assert_eq!(extraction.flat_text, "");
    assert!(extraction.markup.preformatted);
    assert_eq!(extraction.markup.blocks.len(), 1);
}
