//! Scoped mailbox session: connect, log in, select, and always log out.

use tracing::{debug, info, warn};

use super::transport::ImapTransport;
use super::MailboxTransport;
use crate::config::Credentials;
use crate::error::Result;

/// An open, selected mailbox.
///
/// CLOSE and LOGOUT are sent exactly once, either by [`finish`](Self::finish)
/// or when the session is dropped, so every exit path (including `?` on a
/// failed search or fetch) releases the server connection.
pub struct MailboxSession<T: MailboxTransport> {
    transport: T,
    open: bool,
}

impl MailboxSession<ImapTransport> {
    /// Validate `credentials`, connect over TLS, log in and select `mailbox`.
    ///
    /// Credential problems are reported before any network I/O.
    pub fn connect(credentials: &Credentials, mailbox: &str) -> Result<Self> {
        credentials.validate()?;
        info!(
            host = %credentials.host,
            port = credentials.port,
            mailbox,
            "Connecting to IMAP server"
        );
        let transport = ImapTransport::connect(credentials)?;
        Self::open(transport, mailbox)
    }
}

impl<T: MailboxTransport> MailboxSession<T> {
    /// Take over an authenticated transport and select `mailbox`.
    ///
    /// If the selection fails the transport is still closed and logged out.
    pub fn open(transport: T, mailbox: &str) -> Result<Self> {
        let mut session = Self {
            transport,
            open: true,
        };
        session.transport.select(mailbox)?;
        debug!(mailbox, "Mailbox selected");
        Ok(session)
    }

    /// The underlying transport, for issuing commands.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Close the mailbox and log out now.
    pub fn finish(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        // Teardown failures must not mask the result of the work itself.
        if let Err(e) = self.transport.close() {
            warn!(error = %e, "IMAP CLOSE failed");
        }
        if let Err(e) = self.transport.logout() {
            warn!(error = %e, "IMAP LOGOUT failed");
        }
        debug!("IMAP session closed");
    }
}

impl<T: MailboxTransport> Drop for MailboxSession<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
