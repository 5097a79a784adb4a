//! `inbox-harvest`: pull recent messages out of an IMAP mailbox.
//!
//! The crate connects to a mailbox over TLS, searches for messages from the
//! last *N* days, and decodes each one into a [`FetchedMessage`]: decoded
//! subject, first plain-text body part, the raw `Date:` header, and the
//! paths of its attachments, which are written to an output directory
//! without ever overwriting an existing file.
//!
//! The entry point for callers is [`fetch_recent_messages`].

pub mod config;
pub mod error;
pub mod export;
pub mod harvest;
pub mod mailbox;
pub mod model;
pub mod parser;

pub use error::{HarvestError, Result};
pub use harvest::{fetch_recent_messages, HarvestOptions};
pub use model::{FetchedMessage, MessageId};
