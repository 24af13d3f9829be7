use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode bytes with {encoding}: {message}")]
    DecodeFailure { encoding: String, message: String },
    #[error("document is empty")]
    Empty,
}

/// Decode raw document bytes to text: BOM, then strict UTF-8, then chardetng.
pub fn decode_text(bytes: &[u8]) -> Result<DecodedText, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return decode_with(&bytes[bom_len..], encoding);
    }

    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(DecodedText {
            text: text.to_string(),
            encoding_label: UTF_8.name().to_string(),
        });
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> Result<DecodedText, DecodeError> {
    let (text, had_errors) = enc.decode_without_bom_handling(bytes);
    if had_errors {
        return Err(DecodeError::DecodeFailure {
            encoding: enc.name().to_string(),
            message: "decoding error".into(),
        });
    }
    Ok(DecodedText {
        text: text.into_owned(),
        encoding_label: enc.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_utf8_bom() {
        let decoded = decode_text(b"\xEF\xBB\xBFAGREEMENT").unwrap();
        assert_eq!(decoded.text, "AGREEMENT");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn detects_legacy_single_byte_text() {
        let bytes = b"Le pr\xE9avis de r\xE9siliation est d\xE9fini par Fran\xE7ois et Ren\xE9e.";
        let decoded = decode_text(bytes).unwrap();
        assert_eq!(
            decoded.text,
            "Le pr\u{e9}avis de r\u{e9}siliation est d\u{e9}fini par Fran\u{e7}ois et Ren\u{e9}e."
        );
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!(decode_text(b""), Err(DecodeError::Empty));
    }
}
