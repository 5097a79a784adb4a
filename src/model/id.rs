//! Server-assigned message identifiers.

use std::fmt;

/// An opaque, server-assigned message token (an IMAP sequence number).
///
/// Only meaningful inside the session that produced it; never reuse one
/// across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap a raw token as reported by the server.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for MessageId {
    fn from(seq: u32) -> Self {
        Self(seq.to_string())
    }
}

impl From<&str> for MessageId {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}
