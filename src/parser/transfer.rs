//! Content-Transfer-Encoding removal.
//!
//! Part bodies are taken straight from the raw message and only the
//! transfer encoding is undone here; charset conversion is left to the
//! caller so attachments keep their original bytes.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use mail_parser::Encoding;

/// Base64 engine that tolerates the padding mistakes senders routinely make.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Undo `encoding` on a raw part body.
///
/// Returns `None` only for base64 that cannot be decoded at all.
pub fn decode_transfer(encoding: Encoding, body: &[u8]) -> Option<Cow<'_, [u8]>> {
    match encoding {
        Encoding::None => Some(Cow::Borrowed(body)),
        Encoding::Base64 => decode_base64(body).map(Cow::Owned),
        Encoding::QuotedPrintable => Some(Cow::Owned(decode_quoted_printable(body))),
    }
}

/// Base64 with line breaks and other whitespace removed first.
pub fn decode_base64(body: &[u8]) -> Option<Vec<u8>> {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(compact).ok()
}

/// Quoted-printable body decoding (RFC 2045 §6.7).
///
/// `=XX` becomes the byte, `=` at end of line is a soft break, and an `=`
/// not followed by two hex digits is kept literally.
pub fn decode_quoted_printable(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;

    while i < body.len() {
        if body[i] != b'=' {
            out.push(body[i]);
            i += 1;
            continue;
        }

        let rest = &body[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(byte) = rest.get(..2).and_then(hex_byte) {
            out.push(byte);
            i += 3;
        } else {
            out.push(b'=');
            i += 1;
        }
    }

    out
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    let hex = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qp_hex_escapes() {
        assert_eq!(decode_quoted_printable(b"caf=E9"), b"caf\xe9");
        assert_eq!(decode_quoted_printable(b"=3D=3d"), b"==");
    }

    #[test]
    fn test_qp_soft_line_breaks() {
        assert_eq!(decode_quoted_printable(b"long =\r\nline=\nend"), b"long lineend");
    }

    #[test]
    fn test_qp_stray_equals_kept() {
        assert_eq!(decode_quoted_printable(b"a=zz b="), b"a=zz b=");
    }

    #[test]
    fn test_qp_underscore_is_literal() {
        assert_eq!(decode_quoted_printable(b"a_b"), b"a_b");
    }

    #[test]
    fn test_base64_with_line_breaks() {
        assert_eq!(decode_base64(b"xOA=\r\n").unwrap(), vec![0xC4, 0xE0]);
        assert_eq!(decode_base64(b"AA\r\nEC").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_base64_garbage_is_none() {
        assert!(decode_base64(b"!!!!").is_none());
    }

    #[test]
    fn test_identity_borrows() {
        let body = b"\xFF\xFEa\x00";
        assert!(matches!(
            decode_transfer(Encoding::None, body),
            Some(Cow::Borrowed(b)) if b == body
        ));
    }
}
