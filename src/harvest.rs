//! The harvest pipeline: session → selector → decoder, once per message.
//!
//! Processing is sequential. A fetch or write failure on one message stops
//! the run and is returned to the caller; messages decoded before it are
//! not returned. Callers that want per-message isolation should drive
//! [`decode_message`] themselves.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{Config, Credentials};
use crate::error::Result;
use crate::export::attachment::save_attachment;
use crate::mailbox::search::select_recent;
use crate::mailbox::{MailboxSession, MailboxTransport};
use crate::model::{FetchedMessage, MessageId};
use crate::parser::header::{decode_encoded_words, HeaderBlock};
use crate::parser::mime::{build_tree, extract_content, parse_message, MessageContent};

/// Parameters of one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Folder to select.
    pub mailbox: String,
    /// How many days back to search.
    pub days: u32,
    /// Where attachments are written.
    pub output_dir: PathBuf,
}

impl HarvestOptions {
    pub fn new(days: u32, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            mailbox: "INBOX".to_string(),
            days,
            output_dir: output_dir.into(),
        }
    }

    /// Defaults taken from the configuration file.
    pub fn from_config(config: &Config) -> Self {
        Self {
            mailbox: config.mailbox.name.clone(),
            days: config.harvest.days,
            output_dir: config.harvest.output_dir.clone(),
        }
    }
}

/// Fetch every INBOX message from the last `days` days, writing attachments
/// under `output_dir`.
pub fn fetch_recent_messages(
    credentials: &Credentials,
    days: u32,
    output_dir: &Path,
) -> Result<Vec<FetchedMessage>> {
    fetch_recent_messages_with(credentials, &HarvestOptions::new(days, output_dir), &|_, _| {})
}

/// Like [`fetch_recent_messages`], with a configurable mailbox and a
/// `progress(done, total)` callback invoked as messages are decoded.
pub fn fetch_recent_messages_with(
    credentials: &Credentials,
    options: &HarvestOptions,
    progress: &dyn Fn(usize, usize),
) -> Result<Vec<FetchedMessage>> {
    let mut session = MailboxSession::connect(credentials, &options.mailbox)?;
    let messages = harvest(&mut session, options.days, &options.output_dir, progress)?;
    session.finish();
    Ok(messages)
}

/// Search an open session and decode every match.
pub fn harvest<T: MailboxTransport>(
    session: &mut MailboxSession<T>,
    days: u32,
    output_dir: &Path,
    progress: &dyn Fn(usize, usize),
) -> Result<Vec<FetchedMessage>> {
    let transport = session.transport_mut();
    let ids = select_recent(transport, days)?;
    let total = ids.len();
    let mut messages = Vec::with_capacity(total);

    for (done, id) in ids.iter().enumerate() {
        progress(done, total);
        let raw = transport.fetch_rfc822(id)?;
        messages.push(decode_message(id, &raw, output_dir)?);
    }
    progress(total, total);

    info!(
        count = messages.len(),
        output_dir = %output_dir.display(),
        "Harvest complete"
    );
    Ok(messages)
}

/// Decode one raw message and write its attachments.
///
/// Header problems never fail the decode; only attachment writes can.
pub fn decode_message(id: &MessageId, raw: &[u8], output_dir: &Path) -> Result<FetchedMessage> {
    let headers = HeaderBlock::parse(raw);
    let subject = decode_encoded_words(headers.get("subject").unwrap_or_default());
    let date = headers.get("date").unwrap_or_default().to_string();

    let parsed = parse_message(raw);
    let tree = parsed.as_ref().and_then(|message| build_tree(message));
    let content = match &tree {
        Some(tree) => extract_content(tree),
        None => {
            warn!(%id, "Message could not be parsed as MIME, keeping headers only");
            MessageContent::default()
        }
    };

    let mut attachments = Vec::with_capacity(content.attachments.len());
    for part in &content.attachments {
        let path = save_attachment(output_dir, &part.filename, id, part.data)?;
        debug!(%id, path = %path.display(), bytes = part.data.len(), "Saved attachment");
        attachments.push(path);
    }

    Ok(FetchedMessage {
        id: id.clone(),
        subject,
        body: content.body,
        attachments,
        date,
    })
}
