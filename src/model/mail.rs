//! The decoded result record produced for every fetched message.

use std::path::PathBuf;

use super::id::MessageId;

/// One decoded message.
///
/// Built once per fetched identifier and handed to the caller, who owns it
/// from then on.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FetchedMessage {
    /// Identifier the message was fetched under (session-scoped).
    pub id: MessageId,

    /// Decoded subject line (RFC 2047 encoded-words resolved).
    pub subject: String,

    /// First `text/plain` part that is not an attachment.
    /// Empty when the message has no such part.
    pub body: String,

    /// Paths of the written attachments, in MIME document order.
    pub attachments: Vec<PathBuf>,

    /// The `Date:` header exactly as sent (unfolded, not reparsed).
    pub date: String,
}
