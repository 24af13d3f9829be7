//! HTML building blocks shared by extraction, reconciliation and rendering.

pub const STYLESHEET: &str = "body { font-family: Times New Roman, serif; font-size: 11pt; line-height: 1.5; }\n\
.section { margin-top: 10px; margin-bottom: 10px; }\n\
.signature { margin-top: 20px; margin-bottom: 20px; }\n\
.heading { font-weight: bold; }\n\
.indent { margin-left: 20px; }\n\
.clause { margin-top: 10px; margin-bottom: 10px; }\n\
.paragraph { margin-top: 6px; margin-bottom: 6px; }\n";

pub const SPACER: &str = "<div style=\"height: 12px;\"></div>";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Full document shell with the default stylesheet around a body fragment.
pub fn wrap_document(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<style>\n{STYLESHEET}</style>\n</head>\n<body>\n{body}\n</body>\n</html>"
    )
}

/// Last-resort document: the text verbatim in a preformatted container.
pub fn preformatted_document(text: &str) -> String {
    format!(
        "<!DOCTYPE html><html><body><pre>{}</pre></body></html>",
        escape_html(text)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html("Smith & Sons <\"Ltd\">"),
            "Smith &amp; Sons &lt;&quot;Ltd&quot;&gt;"
        );
    }

    #[test]
    fn wrapped_fragment_keeps_body() {
        let doc = wrap_document("<div class=\"paragraph\">x</div>");
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains(".clause {"));
        assert!(doc.contains("<body>\n<div class=\"paragraph\">x</div>\n</body>"));
    }
}
