use redline_logging::redline_warn;

use crate::codec::{DocumentCodec, ParagraphStyle, RenderError, StyledParagraph};
use crate::extract::{is_all_caps, SIGNATURE_KEYWORDS};

const SHORT_HEADING_WORDS: usize = 8;

/// Render reconciled markup; if that fails, render the plain response as
/// classified paragraphs. Errors only when both renderers fail.
pub fn render_with_fallback(
    codec: &dyn DocumentCodec,
    markup: &str,
    response_text: &str,
) -> Result<Vec<u8>, RenderError> {
    match codec.render(markup) {
        Ok(bytes) if !bytes.is_empty() => return Ok(bytes),
        Ok(_) => redline_warn!("Markup rendered to nothing; using paragraph renderer"),
        Err(err) => redline_warn!("Markup render failed ({err}); using paragraph renderer"),
    }
    let paragraphs = classify_paragraphs(response_text);
    codec.render_paragraphs(&paragraphs)
}

/// Split on blank lines and style each paragraph: signature lines first, then
/// headings (all caps, trailing colon, or a short capitalised line).
pub fn classify_paragraphs(text: &str) -> Vec<StyledParagraph> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|para| !para.is_empty())
        .map(|para| StyledParagraph {
            style: paragraph_style(para),
            text: para.to_string(),
        })
        .collect()
}

fn paragraph_style(para: &str) -> ParagraphStyle {
    let lower = para.to_lowercase();
    if SIGNATURE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ParagraphStyle::Signature;
    }
    let short_capitalised = para.split_whitespace().count() <= SHORT_HEADING_WORDS
        && para.chars().next().is_some_and(char::is_uppercase);
    if is_all_caps(para) || para.ends_with(':') || short_capitalised {
        ParagraphStyle::Heading
    } else {
        ParagraphStyle::Normal
    }
}
