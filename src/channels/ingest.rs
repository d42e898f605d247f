//! Long-poll ingest loop for the chat transport.
//!
//! The loop owns a [`PollCursor`] holding the highest update id seen so far.
//! Every polled update advances the cursor before it is interpreted, so an
//! update redelivered by the remote API is never handled twice.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connect::ConnectService;
use super::messages;
use super::traits::{ChannelError, ChatMessage, ChatTransport};

/// High-water mark of processed update ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollCursor {
    high_water: Option<i64>,
}

impl PollCursor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn high_water(&self) -> Option<i64> {
        self.high_water
    }

    /// Offset to request on the next poll (`high_water + 1`).
    #[must_use]
    pub fn offset(&self) -> Option<i64> {
        self.high_water.map(|id| id.saturating_add(1))
    }

    /// Record `update_id`. Returns `false` when it is not newer than the
    /// current mark and must be skipped.
    pub fn observe(&mut self, update_id: i64) -> bool {
        match self.high_water {
            Some(mark) if update_id <= mark => false,
            _ => {
                self.high_water = Some(update_id);
                true
            }
        }
    }
}

/// Bot command recognised by the ingest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Connect,
    Unknown(&'a str),
}

/// Parse a chat message into a command.
///
/// Only the first whitespace-separated token counts, and an `@botname`
/// suffix is ignored. Returns `None` for plain text.
#[must_use]
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let token = text.split_whitespace().next()?;
    if !token.starts_with('/') {
        return None;
    }
    let name = token.split('@').next().unwrap_or(token);
    Some(match name {
        "/start" => Command::Start,
        "/connect" => Command::Connect,
        other => Command::Unknown(other),
    })
}

/// Timing knobs for the ingest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSettings {
    /// Long-poll wait passed to the transport.
    pub poll_timeout_secs: u64,
    /// Delay before retrying a failed poll.
    pub retry_backoff: Duration,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 25,
            retry_backoff: Duration::from_secs(5),
        }
    }
}

/// Perpetual long-poll loop answering bot commands.
pub struct ChatIngestLoop {
    chat: Arc<dyn ChatTransport>,
    connect: Arc<ConnectService>,
    public_url: String,
    settings: IngestSettings,
}

impl ChatIngestLoop {
    pub fn new(
        chat: Arc<dyn ChatTransport>,
        connect: Arc<ConnectService>,
        public_url: impl Into<String>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            chat,
            connect,
            public_url: public_url.into(),
            settings,
        }
    }

    /// Poll until `cancel` fires. Transport failures are logged and retried
    /// after the configured backoff; they never end the loop.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut cursor = PollCursor::new();
        info!(channel = self.chat.id(), "chat ingest loop started");

        loop {
            let polled = tokio::select! {
                _ = cancel.cancelled() => break,
                polled = self.poll_once(&mut cursor) => polled,
            };

            if let Err(e) = polled {
                warn!(
                    channel = self.chat.id(),
                    error = %e,
                    backoff_secs = self.settings.retry_backoff.as_secs(),
                    "chat poll failed, backing off"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.settings.retry_backoff) => {}
                }
            }
        }

        info!(channel = self.chat.id(), "chat ingest loop stopped");
    }

    /// One long-poll round. Returns the number of messages interpreted.
    pub async fn poll_once(&self, cursor: &mut PollCursor) -> Result<usize, ChannelError> {
        let updates = self
            .chat
            .poll(cursor.offset(), self.settings.poll_timeout_secs)
            .await?;

        let mut handled = 0;
        for update in updates {
            if !cursor.observe(update.update_id) {
                debug!(update_id = update.update_id, "skipping already processed update");
                continue;
            }
            if let Some(message) = update.message {
                self.handle_message(&message).await;
                handled += 1;
            }
        }
        Ok(handled)
    }

    async fn handle_message(&self, message: &ChatMessage) {
        let reply = match parse_command(&message.text) {
            Some(Command::Start) => messages::GREETING.to_owned(),
            Some(Command::Connect) => match self.connect.issue(message.sender) {
                Ok(code) => messages::connect_instructions(&self.public_url, &code.code),
                Err(e) => {
                    warn!(chat_id = %message.sender, error = %e, "cannot issue connect code");
                    return;
                }
            },
            Some(Command::Unknown(command)) => {
                debug!(chat_id = %message.sender, command, "unknown command");
                messages::NOT_UNDERSTOOD.to_owned()
            }
            None => {
                debug!(chat_id = %message.sender, text = %message.text, "unhandled chat message");
                return;
            }
        };

        if let Err(e) = self.chat.send(message.sender, &reply).await {
            warn!(chat_id = %message.sender, error = %e, "chat reply failed");
        }
    }
}
