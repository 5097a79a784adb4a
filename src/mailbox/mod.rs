//! IMAP access: the transport seam, the scoped session, and message selection.
//!
//! Everything here is blocking and strictly sequential: one command is in
//! flight per session at any time.

pub mod search;
pub mod session;
pub mod transport;

use crate::error::Result;
use crate::model::MessageId;

pub use session::MailboxSession;
pub use transport::ImapTransport;

/// The IMAP commands the harvester needs, kept behind a trait so the
/// selection and decoding logic can run against a scripted server.
pub trait MailboxTransport {
    /// `SELECT <mailbox>`.
    fn select(&mut self, mailbox: &str) -> Result<()>;

    /// `SEARCH <criteria>`; identifiers are returned in the order the server
    /// listed them. A non-OK answer is [`HarvestError::Search`](crate::error::HarvestError::Search)
    /// carrying the server's text.
    fn search(&mut self, criteria: &str) -> Result<Vec<MessageId>>;

    /// `FETCH <id> (RFC822)`, returning the raw message bytes.
    fn fetch_rfc822(&mut self, id: &MessageId) -> Result<Vec<u8>>;

    /// `CLOSE`.
    fn close(&mut self) -> Result<()>;

    /// `LOGOUT`.
    fn logout(&mut self) -> Result<()>;
}
