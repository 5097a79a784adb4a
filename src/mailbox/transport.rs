//! Production transport: the `imap` crate over a native-tls stream.

use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};
use secrecy::ExposeSecret;

use super::MailboxTransport;
use crate::config::Credentials;
use crate::error::{HarvestError, Result};
use crate::model::MessageId;

type TlsSession = imap::Session<TlsStream<TcpStream>>;

/// An authenticated IMAP session over TLS.
pub struct ImapTransport {
    session: TlsSession,
}

impl ImapTransport {
    /// Open a TLS connection to `host:port` and log in.
    ///
    /// Transport and handshake failures are [`HarvestError::Connection`];
    /// a rejected login is [`HarvestError::Authentication`]. Nothing is retried.
    pub fn connect(credentials: &Credentials) -> Result<Self> {
        let host = credentials.host.as_str();
        let port = credentials.port;

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| HarvestError::Connection(format!("TLS setup failed: {e}")))?;

        let client = imap::connect((host, port), host, &tls)
            .map_err(|e| HarvestError::Connection(format!("{host}:{port}: {e}")))?;

        let session = client
            .login(&credentials.username, credentials.secret.expose_secret())
            .map_err(|(e, _client)| HarvestError::Authentication(e.to_string()))?;

        Ok(Self { session })
    }
}

impl MailboxTransport for ImapTransport {
    fn select(&mut self, mailbox: &str) -> Result<()> {
        self.session
            .select(mailbox)
            .map(|_| ())
            .map_err(|e| HarvestError::Connection(format!("SELECT {mailbox} failed: {e}")))
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<MessageId>> {
        // `Session::search` collects into a HashSet; read the raw response
        // instead so the server's ordering survives.
        let response = self
            .session
            .run_command_and_read_response(format!("SEARCH {criteria}"))
            .map_err(|e| match e {
                imap::Error::No(text) => HarvestError::Search {
                    response: format!("NO {text}"),
                },
                imap::Error::Bad(text) => HarvestError::Search {
                    response: format!("BAD {text}"),
                },
                other => HarvestError::Connection(format!("SEARCH failed: {other}")),
            })?;

        Ok(parse_search_response(&response))
    }

    fn fetch_rfc822(&mut self, id: &MessageId) -> Result<Vec<u8>> {
        let fetches = self
            .session
            .fetch(id.as_str(), "(RFC822)")
            .map_err(|e| match e {
                imap::Error::No(text) | imap::Error::Bad(text) => HarvestError::Fetch {
                    id: id.clone(),
                    reason: text,
                },
                other => HarvestError::Connection(format!("FETCH {id} failed: {other}")),
            })?;

        fetches
            .iter()
            .find_map(|fetch| fetch.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| HarvestError::Fetch {
                id: id.clone(),
                reason: "server returned no message body".to_string(),
            })
    }

    fn close(&mut self) -> Result<()> {
        self.session
            .close()
            .map_err(|e| HarvestError::Connection(format!("CLOSE failed: {e}")))
    }

    fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .map_err(|e| HarvestError::Connection(format!("LOGOUT failed: {e}")))
    }
}

/// Collect the identifiers from the untagged `* SEARCH` lines of a response,
/// in the order they appear.
pub(crate) fn parse_search_response(response: &[u8]) -> Vec<MessageId> {
    const PREFIX: &str = "* SEARCH";

    let text = String::from_utf8_lossy(response);
    let mut ids = Vec::new();

    for line in text.lines() {
        let is_search = line
            .get(..PREFIX.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(PREFIX));
        if !is_search {
            continue;
        }
        let rest = &line[PREFIX.len()..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            continue;
        }
        ids.extend(
            rest.split_ascii_whitespace()
                .filter(|token| token.bytes().all(|b| b.is_ascii_digit()))
                .map(MessageId::from),
        );
    }

    ids
}
