//! MIME structure: a recursive part tree built on top of `mail-parser`, and
//! the single depth-first walk that finds the body and the attachments.
//!
//! `mail-parser` locates the parts; their content is read back from the raw
//! message and only transfer-decoded, so attachments keep their exact bytes
//! and body text goes through [`decode_charset`].

use std::borrow::Cow;

use mail_parser::{Message, MessagePart, MessageParser, MimeHeaders, PartType};
use tracing::warn;

use super::header::{decode_charset, decode_encoded_words, header_param, HeaderBlock};
use super::transfer::decode_transfer;

/// Maximum depth for recursive multipart descent (to prevent runaway recursion
/// on adversarial input). Containers below this depth are kept without children.
const MAX_DEPTH: usize = 10;

/// Header information shared by every kind of node.
#[derive(Debug, Clone, PartialEq)]
pub struct PartInfo {
    /// Lowercase `type/subtype`; `text/plain` when the part declares none.
    pub content_type: String,
    /// The `charset` parameter of `Content-Type`, if any.
    pub charset: Option<String>,
    /// Filename as written in `Content-Disposition` (or `Content-Type; name=`),
    /// encoded-words not yet decoded. Empty names count as absent.
    pub filename: Option<String>,
}

/// One node of the MIME tree.
#[derive(Debug, Clone, PartialEq)]
pub enum MimeNode<'m> {
    /// A part with content of its own. `data` is transfer-decoded only.
    Leaf { info: PartInfo, data: Cow<'m, [u8]> },
    /// A `multipart/*` part or an embedded `message/rfc822`.
    ///
    /// `data` is the embedded message for `message/rfc822` and empty for
    /// multiparts.
    Container {
        info: PartInfo,
        data: Cow<'m, [u8]>,
        children: Vec<MimeNode<'m>>,
    },
}

impl<'m> MimeNode<'m> {
    pub fn info(&self) -> &PartInfo {
        match self {
            MimeNode::Leaf { info, .. } | MimeNode::Container { info, .. } => info,
        }
    }

    /// Bytes to store when this node is saved as an attachment.
    pub fn content(&self) -> &[u8] {
        match self {
            MimeNode::Leaf { data, .. } | MimeNode::Container { data, .. } => data,
        }
    }

    /// Depth-first, document-order iterator over this node and all
    /// descendants (parents before children).
    pub fn walk(&self) -> Walk<'_, 'm> {
        Walk { stack: vec![self] }
    }
}

/// Iterator returned by [`MimeNode::walk`].
pub struct Walk<'a, 'm> {
    stack: Vec<&'a MimeNode<'m>>,
}

impl<'a, 'm> Iterator for Walk<'a, 'm> {
    type Item = &'a MimeNode<'m>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let MimeNode::Container { children, .. } = node {
            self.stack.extend(children.iter().rev());
        }
        Some(node)
    }
}

/// A part that declares a filename, with the name already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentPart<'a> {
    pub filename: String,
    pub data: &'a [u8],
}

/// What one pass over the tree yields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageContent<'a> {
    /// First `text/plain` part without a filename; empty if there is none.
    pub body: String,
    /// Every part with a filename, in document order.
    pub attachments: Vec<AttachmentPart<'a>>,
}

/// Parse raw RFC 822 bytes with `mail-parser`.
///
/// Returns `None` when the bytes do not look like a message at all.
pub fn parse_message(raw_message: &[u8]) -> Option<Message<'_>> {
    MessageParser::default().parse(raw_message)
}

/// Build the part tree of a parsed message.
pub fn build_tree<'m>(message: &'m Message<'_>) -> Option<MimeNode<'m>> {
    build_tree_at(message, 0)
}

fn build_tree_at<'m>(message: &'m Message<'_>, depth: usize) -> Option<MimeNode<'m>> {
    // Part offsets of an embedded message point into its `raw_message`,
    // which is the enclosing stream unless the embedding was encoded.
    let raw = message.raw_message();
    message
        .parts
        .first()
        .map(|root| node_from_part(message, raw, root, depth))
}

fn node_from_part<'m>(
    message: &'m Message<'_>,
    raw: &'m [u8],
    part: &'m MessagePart<'_>,
    depth: usize,
) -> MimeNode<'m> {
    let info = part_info(raw, part);

    match &part.body {
        PartType::Text(text) | PartType::Html(text) => MimeNode::Leaf {
            info,
            data: raw_body(raw, part).unwrap_or(Cow::Borrowed(text.as_bytes())),
        },
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => MimeNode::Leaf {
            info,
            data: raw_body(raw, part).unwrap_or(Cow::Borrowed(bytes.as_ref())),
        },
        PartType::Multipart(ids) => {
            let children = if depth >= MAX_DEPTH {
                warn!(depth, "MIME nesting too deep, not descending further");
                Vec::new()
            } else {
                ids.iter()
                    .filter_map(|id| message.parts.get(*id))
                    .map(|child| node_from_part(message, raw, child, depth + 1))
                    .collect()
            };
            MimeNode::Container {
                info,
                data: Cow::Borrowed(&[]),
                children,
            }
        }
        PartType::Message(nested) => {
            let children = if depth >= MAX_DEPTH {
                warn!(depth, "MIME nesting too deep, not descending further");
                Vec::new()
            } else {
                build_tree_at(nested, depth + 1).into_iter().collect()
            };
            MimeNode::Container {
                info,
                data: raw_body(raw, part).unwrap_or(Cow::Borrowed(nested.raw_message())),
                children,
            }
        }
    }
}

/// The part body as it appears in `raw`, with the transfer encoding undone.
///
/// `None` when the offsets do not fit `raw` or the base64 is unreadable;
/// callers then use what `mail-parser` decoded.
fn raw_body<'m>(raw: &'m [u8], part: &MessagePart<'_>) -> Option<Cow<'m, [u8]>> {
    let body = raw.get(part.offset_body..part.offset_end)?;
    let decoded = decode_transfer(part.encoding, body);
    if decoded.is_none() {
        warn!(
            offset = part.offset_body,
            "Undecodable base64 body, using parser output"
        );
    }
    decoded
}

fn part_info(raw: &[u8], part: &MessagePart<'_>) -> PartInfo {
    let (content_type, charset) = match part.content_type() {
        Some(ct) => {
            let main = ct.ctype().to_ascii_lowercase();
            let full = match ct.subtype() {
                Some(sub) => format!("{main}/{}", sub.to_ascii_lowercase()),
                None => main,
            };
            (full, ct.attribute("charset").map(String::from))
        }
        None => ("text/plain".to_string(), None),
    };

    // RFC 2231 `filename*=` names are only available already decoded.
    let filename = raw_filename(raw, part)
        .or_else(|| part.attachment_name().map(String::from))
        .filter(|name| !name.trim().is_empty());

    PartInfo {
        content_type,
        charset,
        filename,
    }
}

/// `filename=` from `Content-Disposition`, else `name=` from `Content-Type`,
/// read from the part's own header bytes.
fn raw_filename(raw: &[u8], part: &MessagePart<'_>) -> Option<String> {
    let headers = HeaderBlock::parse(raw.get(part.offset_header..part.offset_body)?);
    headers
        .get("content-disposition")
        .and_then(|value| header_param(value, "filename"))
        .or_else(|| {
            headers
                .get("content-type")
                .and_then(|value| header_param(value, "name"))
        })
}

/// Walk the tree once, collecting the body and every named part.
///
/// The body is the first `text/plain` node without a filename, decoded with
/// its declared charset (UTF-8 when none); later plain text parts are
/// ignored for the body but still become attachments when they carry a
/// filename.
pub fn extract_content<'a>(root: &'a MimeNode<'_>) -> MessageContent<'a> {
    let mut body: Option<String> = None;
    let mut attachments = Vec::new();

    for node in root.walk() {
        let info = node.info();

        match &info.filename {
            Some(raw_name) => attachments.push(AttachmentPart {
                filename: decode_encoded_words(raw_name).trim().to_string(),
                data: node.content(),
            }),
            None if body.is_none() && info.content_type == "text/plain" => {
                if let MimeNode::Leaf { data, .. } = node {
                    let charset = info.charset.as_deref().unwrap_or("");
                    body = Some(decode_charset(charset, data));
                }
            }
            None => {}
        }
    }

    MessageContent {
        body: body.unwrap_or_default(),
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(content_type: &str, filename: Option<&str>, text: &'static str) -> MimeNode<'static> {
        MimeNode::Leaf {
            info: PartInfo {
                content_type: content_type.to_string(),
                charset: None,
                filename: filename.map(String::from),
            },
            data: Cow::Borrowed(text.as_bytes()),
        }
    }

    fn container(children: Vec<MimeNode<'static>>) -> MimeNode<'static> {
        MimeNode::Container {
            info: PartInfo {
                content_type: "multipart/mixed".to_string(),
                charset: None,
                filename: None,
            },
            data: Cow::Borrowed(&[]),
            children,
        }
    }

    #[test]
    fn test_walk_is_preorder() {
        let tree = container(vec![
            container(vec![leaf("text/plain", None, "a"), leaf("text/html", None, "b")]),
            leaf("application/pdf", Some("c.pdf"), "c"),
        ]);
        let order: Vec<&[u8]> = tree
            .walk()
            .filter(|n| matches!(n, MimeNode::Leaf { .. }))
            .map(|n| n.content())
            .collect();
        assert_eq!(order, vec![&b"a"[..], &b"b"[..], &b"c"[..]]);
        assert_eq!(tree.walk().count(), 5);
    }

    #[test]
    fn test_first_plain_part_wins() {
        let tree = container(vec![
            leaf("text/html", None, "<p>html</p>"),
            leaf("text/plain", None, "first"),
            leaf("text/plain", None, "second"),
        ]);
        let content = extract_content(&tree);
        assert_eq!(content.body, "first");
        assert!(content.attachments.is_empty());
    }

    #[test]
    fn test_named_plain_part_is_attachment_not_body() {
        let tree = container(vec![
            leaf("text/plain", Some("notes.txt"), "attached"),
            leaf("text/plain", None, "real body"),
        ]);
        let content = extract_content(&tree);
        assert_eq!(content.body, "real body");
        assert_eq!(content.attachments.len(), 1);
        assert_eq!(content.attachments[0].filename, "notes.txt");
        assert_eq!(content.attachments[0].data, b"attached");
    }

    #[test]
    fn test_no_body_is_empty_string() {
        let tree = container(vec![leaf("text/html", None, "<p>only html</p>")]);
        assert_eq!(extract_content(&tree).body, "");
    }

    #[test]
    fn test_attachment_name_decoded_and_trimmed() {
        let tree = container(vec![leaf(
            "application/pdf",
            Some("  =?UTF-8?B?0L7RgtGH0ZHRgi5wZGY=?=  "),
            "%PDF",
        )]);
        let content = extract_content(&tree);
        assert_eq!(content.attachments[0].filename, "отчёт.pdf");
    }

    #[test]
    fn test_build_tree_from_raw_multipart() {
        let raw = b"Subject: t\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
hello\r\n\
--XX\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"data.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
AAEC\r\n\
--XX--\r\n";
        let message = parse_message(raw).expect("parse");
        let tree = build_tree(&message).expect("tree");
        assert_eq!(tree.info().content_type, "multipart/mixed");

        let content = extract_content(&tree);
        assert_eq!(content.body.trim_end(), "hello");
        assert_eq!(content.attachments.len(), 1);
        assert_eq!(content.attachments[0].filename, "data.bin");
        assert_eq!(content.attachments[0].data, &[0u8, 1, 2][..]);
    }

    #[test]
    fn test_single_part_without_content_type_is_plain_text() {
        let raw = b"Subject: plain\r\n\r\njust text\r\n";
        let message = parse_message(raw).expect("parse");
        let tree = build_tree(&message).expect("tree");
        assert_eq!(tree.info().content_type, "text/plain");
        assert_eq!(extract_content(&tree).body.trim_end(), "just text");
    }

    fn content_of(raw: &[u8]) -> (String, Vec<(String, Vec<u8>)>) {
        let message = parse_message(raw).expect("parse");
        let tree = build_tree(&message).expect("tree");
        let content = extract_content(&tree);
        let attachments = content
            .attachments
            .iter()
            .map(|a| (a.filename.clone(), a.data.to_vec()))
            .collect();
        (content.body, attachments)
    }

    #[test]
    fn test_text_attachment_keeps_charset_bytes() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/csv; charset=windows-1251\r\n\
Content-Disposition: attachment; filename=\"a.csv\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
xOA=\r\n\
--XX\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
Content-Disposition: attachment; filename=\"b.txt\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
//5hAA==\r\n\
--XX--\r\n";
        let (_, attachments) = content_of(raw);
        assert_eq!(attachments[0], ("a.csv".to_string(), vec![0xC4, 0xE0]));
        assert_eq!(attachments[1], ("b.txt".to_string(), vec![0xFF, 0xFE, 0x61, 0x00]));
    }

    #[test]
    fn test_quoted_printable_attachment_decoded() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain; charset=iso-8859-1; name=\"n.txt\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=E9 =\r\nnoir\r\n\
--XX--\r\n";
        let (_, attachments) = content_of(raw);
        assert_eq!(attachments[0].0, "n.txt");
        assert_eq!(attachments[0].1, b"caf\xe9 noir");
    }

    #[test]
    fn test_body_drops_malformed_bytes() {
        let raw = b"Content-Type: text/plain; charset=utf-8\r\n\
Content-Transfer-Encoding: 8bit\r\n\
\r\n\
ab\xFFcd\r\n";
        let (body, _) = content_of(raw);
        assert_eq!(body.trim_end(), "abcd");
    }

    #[test]
    fn test_body_quoted_printable_in_legacy_charset() {
        let raw = b"Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=E9 au =\r\nlait\r\n";
        let (body, _) = content_of(raw);
        assert_eq!(body.trim_end(), "caf\u{e9} au lait");
    }

    #[test]
    fn test_filename_encoded_word_drops_malformed_bytes() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"=?UTF-8?Q?ab=FFcd.pdf?=\"\r\n\
\r\n\
%PDF\r\n\
--XX--\r\n";
        let (_, attachments) = content_of(raw);
        assert_eq!(attachments[0].0, "abcd.pdf");
    }

    #[test]
    fn test_filename_from_content_type_name() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: image/png; name=\"=?ISO-8859-1?Q?f=E9te.png?=\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
iVBORw==\r\n\
--XX--\r\n";
        let (_, attachments) = content_of(raw);
        assert_eq!(attachments[0].0, "f\u{e9}te.png");
        assert_eq!(attachments[0].1, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_rfc2231_filename_uses_parser_name() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/csv\r\n\
Content-Disposition: attachment; filename*=UTF-8''%D1%81%D1%87%D0%B5%D1%82.csv\r\n\
\r\n\
a,b\r\n\
--XX--\r\n";
        let (_, attachments) = content_of(raw);
        assert_eq!(attachments[0].0, "\u{441}\u{447}\u{435}\u{442}.csv");
        assert_eq!(attachments[0].1, b"a,b");
    }

    #[test]
    fn test_embedded_message_content_is_only_the_inner_message() {
        let raw = b"Subject: outer\r\n\
Content-Type: multipart/mixed; boundary=\"XX\"\r\n\
\r\n\
--XX\r\n\
Content-Type: text/plain\r\n\
\r\n\
see below\r\n\
--XX\r\n\
Content-Type: message/rfc822\r\n\
Content-Disposition: attachment; filename=\"fwd.eml\"\r\n\
\r\n\
Subject: inner\r\n\
\r\n\
inner text\r\n\
--XX--\r\n";
        let (body, attachments) = content_of(raw);
        assert_eq!(body.trim_end(), "see below");
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].0, "fwd.eml");
        let saved = String::from_utf8(attachments[0].1.clone()).unwrap();
        assert!(saved.starts_with("Subject: inner"), "{saved:?}");
        assert!(!saved.contains("outer"), "{saved:?}");
        assert!(saved.contains("inner text"));
    }
}
